use std::fmt;

use crate::i2c::TransactionExecutor;

use super::{
	Eeprom,
	Error,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TestRecord {
	pub offset: u16,
	pub sentinel: u8,
	pub filler: u8,
}

impl Default for TestRecord {
	fn default() -> Self {
		TestRecord {
			offset: 0x6464,
			sentinel: 0x19,
			filler: 0xff,
		}
	}
}

impl TestRecord {
	fn payload(&self) -> [u8; 2] {
		[self.sentinel, self.filler]
	}

	// one byte early so a shifted read pointer shows
	fn read_start(&self) -> u16 {
		self.offset.wrapping_sub(1)
	}
}

const READ_BACK_LEN: usize = 3;
const SENTINEL_INDEX: usize = 1;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Phase {
	Write,
	Read,
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Phase::Write => write!(f, "write phase"),
			Phase::Read => write!(f, "read phase"),
		}
	}
}

#[derive(Debug)]
pub enum Outcome {
	Pass,
	Fail {
		phase: Phase,
		error: Error,
	},
}

impl Outcome {
	pub fn is_pass(&self) -> bool {
		match self {
			Outcome::Pass => true,
			Outcome::Fail { .. } => false,
		}
	}

	pub fn failed_phase(&self) -> Option<Phase> {
		match self {
			Outcome::Pass => None,
			Outcome::Fail { phase, .. } => Some(*phase),
		}
	}

	pub fn into_result(self) -> crate::AResult<()> {
		match self {
			Outcome::Pass => Ok(()),
			Outcome::Fail { phase, error } => bail!("i2c write/read test failed in {}: {}", phase, error),
		}
	}
}

enum State {
	WritePhase,
	ReadPhase,
	Done(Outcome),
}

/// The write phase is a regular page write (including its settle delay),
/// the read phase a single address/burst transfer over the record.
#[derive(Debug)]
pub struct RoundTrip {
	record: TestRecord,
}

impl RoundTrip {
	pub fn new(record: TestRecord) -> Self {
		RoundTrip {
			record,
		}
	}

	fn fail(phase: Phase, error: Error) -> State {
		State::Done(Outcome::Fail { phase, error })
	}

	fn step<E: TransactionExecutor>(&self, state: State, eeprom: &mut Eeprom<E>) -> State {
		let record = self.record;
		match state {
			State::WritePhase => {
				match eeprom.write_at(record.offset as usize, &record.payload()) {
					Ok(_) => State::ReadPhase,
					Err(e) => Self::fail(Phase::Write, e),
				}
			},
			State::ReadPhase => {
				match eeprom.read_at(record.read_start() as usize, READ_BACK_LEN) {
					Err(e) => Self::fail(Phase::Read, e),
					Ok(ref data) if data[SENTINEL_INDEX] != record.sentinel => Self::fail(Phase::Read, Error::VerifyMismatch {
						offset: record.offset,
						expected: record.sentinel,
						found: data[SENTINEL_INDEX],
					}),
					Ok(_) => State::Done(Outcome::Pass),
				}
			},
			done @ State::Done(_) => done,
		}
	}

	pub fn run<E: TransactionExecutor>(self, eeprom: &mut Eeprom<E>) -> Outcome {
		let mut state = State::WritePhase;
		loop {
			state = match state {
				State::Done(outcome) => {
					match &outcome {
						Outcome::Pass => info!("{}: round trip at 0x{:04x} passed", eeprom.address(), self.record.offset),
						Outcome::Fail { phase, error } => warn!("{}: round trip failed in {}: {}", eeprom.address(), phase, error),
					}
					return outcome;
				},
				state => self.step(state, eeprom),
			};
		}
	}
}
