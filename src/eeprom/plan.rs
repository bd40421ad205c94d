use super::{
	Error,
	Result,
};

/// Size of the memory offset space addressable with 2 offset bytes.
pub const ADDRESS_SPACE: usize = 0x1_0000;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Chunk {
	pub offset: u16,
	pub len: usize,
}

impl Chunk {
	// big-endian, as sent on the bus
	pub fn offset_bytes(&self) -> [u8; 2] {
		[(self.offset >> 8) as u8, self.offset as u8]
	}
}

/// Lazily partitions `[start, start + len)` into chunks.
///
/// With `aligned` the chunk boundaries are multiples of `size` in device
/// memory (page writes must not cross a page); otherwise they are multiples
/// of `size` relative to `start`.
#[derive(Clone, Debug)]
pub struct TransferPlan {
	next: usize,
	end: usize,
	size: usize,
	aligned: bool,
}

impl TransferPlan {
	fn new(start: usize, len: usize, size: usize, aligned: bool) -> Result<Self> {
		if size == 0 {
			return Err(Error::InvalidConfig("chunk size must not be zero".into()));
		}
		if start > ADDRESS_SPACE || len > ADDRESS_SPACE - start {
			return Err(Error::OutOfRange { offset: start, len });
		}
		Ok(TransferPlan {
			next: start,
			end: start + len,
			size,
			aligned,
		})
	}

	pub fn pages(start: usize, len: usize, page_size: usize) -> Result<Self> {
		Self::new(start, len, page_size, true)
	}

	pub fn reads(start: usize, len: usize, chunk_size: usize) -> Result<Self> {
		Self::new(start, len, chunk_size, false)
	}

	pub fn remaining(&self) -> usize {
		self.end - self.next
	}
}

impl Iterator for TransferPlan {
	type Item = Chunk;

	fn next(&mut self) -> Option<Chunk> {
		if self.next >= self.end {
			return None;
		}
		let room = if self.aligned {
			self.size - self.next % self.size
		} else {
			self.size
		};
		let len = room.min(self.end - self.next);
		let chunk = Chunk {
			offset: self.next as u16,
			len,
		};
		self.next += len;
		Some(chunk)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		if self.next >= self.end {
			return (0, Some(0));
		}
		let head = if self.aligned { self.next % self.size } else { 0 };
		let n = (head + self.remaining() + self.size - 1) / self.size;
		(n, Some(n))
	}
}

impl ExactSizeIterator for TransferPlan {}
