//! Plain I2C master transfers, as exposed by Linux `i2c-dev`.
//!
//! A transfer is a list of messages executed back to back with repeated
//! START conditions in between; only the last message is followed by a STOP.
//! Memory devices rely on that: a write of the memory offset followed by a
//! read message (without STOP) reads from that offset.

use std::fmt;
use std::io;
use std::thread;
use std::time::{
	Duration,
	Instant,
};

mod address;
pub mod linux;
pub mod sim;

pub use self::address::{
	AddressError,
	BusAddress,
	MAX_ADDRESS,
	MIN_ADDRESS,
};

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
	Write,
	Read,
}

pub enum Message<'a> {
	Write {
		address: BusAddress,
		data: &'a [u8],
	},
	Read {
		address: BusAddress,
		buffer: &'a mut [u8],
	},
}

impl<'a> Message<'a> {
	pub fn address(&self) -> BusAddress {
		match self {
			Message::Write { address, .. } => *address,
			Message::Read { address, .. } => *address,
		}
	}

	pub fn direction(&self) -> Direction {
		match self {
			Message::Write { .. } => Direction::Write,
			Message::Read { .. } => Direction::Read,
		}
	}

	pub fn len(&self) -> usize {
		self.bytes().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn bytes(&self) -> &[u8] {
		match self {
			Message::Write { data, .. } => data,
			Message::Read { buffer, .. } => buffer,
		}
	}
}

// same layout as i2ctransfer's verbose output
impl<'a> fmt::Display for Message<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let direction = match self.direction() {
			Direction::Write => "write",
			Direction::Read => "read",
		};
		write!(f, "addr {}, {}, len {}", self.address(), direction, self.len())?;
		if !self.is_empty() {
			write!(f, ", buf")?;
			for b in self.bytes() {
				write!(f, " 0x{:02x}", b)?;
			}
		}
		Ok(())
	}
}

pub trait TransactionExecutor {
	/// Runs all `messages` as one combined transfer and returns how many of
	/// them completed; anything less than `messages.len()` means the
	/// transfer failed.
	fn submit(&mut self, messages: &mut [Message]) -> io::Result<usize>;

	fn settle(&mut self, duration: Duration) {
		reliable_sleep(duration);
	}
}

impl<'a, E: ?Sized + TransactionExecutor> TransactionExecutor for &'a mut E {
	fn submit(&mut self, messages: &mut [Message]) -> io::Result<usize> {
		E::submit(*self, messages)
	}

	fn settle(&mut self, duration: Duration) {
		E::settle(*self, duration)
	}
}

impl<E: ?Sized + TransactionExecutor> TransactionExecutor for Box<E> {
	fn submit(&mut self, messages: &mut [Message]) -> io::Result<usize> {
		E::submit(&mut **self, messages)
	}

	fn settle(&mut self, duration: Duration) {
		E::settle(&mut **self, duration)
	}
}

pub(crate) fn trace_messages(messages: &[Message], completed: usize) {
	if !log_enabled!(log::Level::Trace) {
		return;
	}
	for (i, msg) in messages.iter().take(completed).enumerate() {
		trace!("msg {}: {}", i, msg);
	}
}
