//! In-memory stand-in for a 24Cxx-style EEPROM with 2-byte memory offsets.
//!
//! Behaves like the real part where the transfer protocol can go wrong:
//! page writes wrap within their page, reads continue from the latched
//! address pointer, and the chip NAKs everything while its write cycle is
//! still running (i.e. until the bus owner settled long enough).

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use super::{
	BusAddress,
	Direction,
	Message,
	TransactionExecutor,
	trace_messages,
};

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Event {
	Transfer(Vec<Record>),
	Settle(Duration),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Record {
	pub direction: Direction,
	pub address: BusAddress,
	pub data: Vec<u8>,
	pub len: usize,
}

#[derive(Debug)]
pub struct SimulatedEeprom {
	address: BusAddress,
	memory: Vec<u8>,
	page_size: usize,
	write_cycle: Duration,
	pointer: usize,
	busy: bool,
	submissions: usize,
	faults: HashMap<usize, usize>,
	events: Vec<Event>,
}

impl SimulatedEeprom {
	/// `size` must be a multiple of `page_size`; memory starts erased (0xff).
	pub fn new(address: BusAddress, size: usize, page_size: usize, write_cycle: Duration) -> Self {
		assert!(page_size > 0 && size > 0 && size % page_size == 0);
		SimulatedEeprom {
			address,
			memory: vec![0xff; size],
			page_size,
			write_cycle,
			pointer: 0,
			busy: false,
			submissions: 0,
			faults: HashMap::new(),
			events: Vec::new(),
		}
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn memory_mut(&mut self) -> &mut [u8] {
		&mut self.memory
	}

	pub fn events(&self) -> &[Event] {
		&self.events
	}

	pub fn clear_events(&mut self) {
		self.events.clear();
	}

	// including failed ones
	pub fn submissions(&self) -> usize {
		self.submissions
	}

	/// Transfer number `submission` (0-based, counting from creation) will
	/// stop after `completed` messages, as if the device NAKed.
	pub fn inject_fault(&mut self, submission: usize, completed: usize) {
		self.faults.insert(submission, completed);
	}

	pub fn transfers(&self) -> impl Iterator<Item = &Vec<Record>> {
		self.events.iter().filter_map(|e| match e {
			Event::Transfer(records) => Some(records),
			Event::Settle(_) => None,
		})
	}

	fn write_message(&mut self, data: &[u8]) {
		if data.len() < 2 {
			// only a partial address; the chip ignores it
			return;
		}
		let offset = ((data[0] as usize) << 8 | data[1] as usize) % self.memory.len();
		self.pointer = offset;
		let payload = &data[2..];
		if payload.is_empty() {
			return;
		}
		let page_base = offset - offset % self.page_size;
		for (i, b) in payload.iter().enumerate() {
			let column = (offset + i) % self.page_size;
			self.memory[page_base + column] = *b;
		}
		self.pointer = page_base + (offset + payload.len()) % self.page_size;
		self.busy = true;
	}

	fn read_message(&mut self, buffer: &mut [u8]) {
		for b in buffer.iter_mut() {
			*b = self.memory[self.pointer];
			self.pointer = (self.pointer + 1) % self.memory.len();
		}
	}
}

impl TransactionExecutor for SimulatedEeprom {
	fn submit(&mut self, messages: &mut [Message]) -> io::Result<usize> {
		let submission = self.submissions;
		self.submissions += 1;

		let limit = match self.faults.remove(&submission) {
			Some(completed) => completed.min(messages.len()),
			None => messages.len(),
		};
		// write cycle still running: not even the first address byte gets an ACK
		let limit = if self.busy { 0 } else { limit };

		let mut completed = 0;
		let mut records = Vec::new();
		for msg in messages.iter_mut() {
			if completed == limit || msg.address() != self.address {
				break;
			}
			let address = msg.address();
			match msg {
				Message::Write { data, .. } => {
					self.write_message(data);
					records.push(Record { direction: Direction::Write, address, data: data.to_vec(), len: data.len() });
				},
				Message::Read { buffer, .. } => {
					self.read_message(buffer);
					records.push(Record { direction: Direction::Read, address, data: Vec::new(), len: buffer.len() });
				},
			}
			completed += 1;
		}

		trace_messages(messages, completed);
		self.events.push(Event::Transfer(records));
		Ok(completed)
	}

	fn settle(&mut self, duration: Duration) {
		if duration >= self.write_cycle {
			self.busy = false;
		}
		self.events.push(Event::Settle(duration));
	}
}
