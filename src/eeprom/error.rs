use std::io;

use crate::i2c::AddressError;

#[derive(Debug, Fail)]
pub enum Error {
	#[fail(display = "invalid chip address: {}", _0)]
	InvalidAddress(#[cause] AddressError),

	#[fail(display = "transfer at offset 0x{:04x} failed: only {}/{} messages were sent", offset, completed, submitted)]
	Transfer {
		offset: u16,
		completed: usize,
		submitted: usize,
	},

	#[fail(display = "transfer at offset 0x{:04x} failed: {}", offset, cause)]
	Bus {
		offset: u16,
		#[cause]
		cause: io::Error,
	},

	#[fail(display = "no memory for buffer of {} bytes", len)]
	Resource {
		len: usize,
	},

	#[fail(display = "verify failed at 0x{:04x}: expected 0x{:02x}, read 0x{:02x}", offset, expected, found)]
	VerifyMismatch {
		offset: u16,
		expected: u8,
		found: u8,
	},

	#[fail(display = "range of {} bytes at offset 0x{:04x} exceeds the 16-bit address space", len, offset)]
	OutOfRange {
		offset: usize,
		len: usize,
	},

	#[fail(display = "invalid configuration: {}", _0)]
	InvalidConfig(String),

	#[fail(display = "failed writing read data: {}", _0)]
	Sink(#[cause] io::Error),
}

impl Error {
	pub fn is_transfer(&self) -> bool {
		match self {
			Error::Transfer { .. } | Error::Bus { .. } => true,
			_ => false,
		}
	}

	pub fn offset(&self) -> Option<u16> {
		match self {
			Error::Transfer { offset, .. } => Some(*offset),
			Error::Bus { offset, .. } => Some(*offset),
			Error::VerifyMismatch { offset, .. } => Some(*offset),
			_ => None,
		}
	}
}

impl From<AddressError> for Error {
	fn from(e: AddressError) -> Self {
		Error::InvalidAddress(e)
	}
}

pub type Result<T> = std::result::Result<T, Error>;
