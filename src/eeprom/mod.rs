//! Page-oriented programming of 24Cxx-style I2C EEPROMs with 2-byte memory
//! offsets.
//!
//! Writes go out one page per transfer: the big-endian memory offset
//! followed by at most one page of data, which must not cross a page
//! boundary (the chip would wrap around within the page). After each page
//! the chip runs an internal write cycle and NAKs everything until it is
//! done, so the bus owner has to wait for the settle delay.
//!
//! Reads are two-message transfers: write the offset, then (repeated START,
//! no STOP) read a burst.

use std::collections::TryReserveError;
use std::io;
use std::time::Duration;

use crate::i2c::{
	BusAddress,
	Message,
	TransactionExecutor,
};

mod error;
pub mod plan;
pub mod verify;

pub use self::error::{
	Error,
	Result,
};

pub use self::plan::{
	ADDRESS_SPACE,
	Chunk,
	TransferPlan,
};

pub use self::verify::{
	Outcome,
	Phase,
	RoundTrip,
	TestRecord,
};

pub const ADDRESS_WIDTH: usize = 2;

pub const DEFAULT_PAGE_SIZE: usize = 32;
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_micros(1700);
pub const DEFAULT_CAPACITY: usize = 8192;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Config {
	pub page_size: usize,
	pub read_chunk_size: usize,
	pub settle_delay: Duration,
	/// used for erasing and as default read length
	pub capacity: usize,
	pub blank: u8,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			page_size: DEFAULT_PAGE_SIZE,
			read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
			settle_delay: DEFAULT_SETTLE_DELAY,
			capacity: DEFAULT_CAPACITY,
			blank: 0x00,
		}
	}
}

impl Config {
	pub fn validate(&self) -> Result<()> {
		// i2c_msg.len is 16 bits
		let max_msg = u16::max_value() as usize;
		if self.page_size == 0 || self.page_size + ADDRESS_WIDTH > max_msg {
			return Err(Error::InvalidConfig(format!("page size {} out of range (1-{})", self.page_size, max_msg - ADDRESS_WIDTH)));
		}
		if self.read_chunk_size == 0 || self.read_chunk_size > max_msg {
			return Err(Error::InvalidConfig(format!("read chunk size {} out of range (1-{})", self.read_chunk_size, max_msg)));
		}
		if self.capacity > ADDRESS_SPACE {
			return Err(Error::InvalidConfig(format!("capacity {} exceeds the 16-bit address space", self.capacity)));
		}
		Ok(())
	}
}

fn alloc_buffer(len: usize) -> Result<Vec<u8>> {
	let mut buf = Vec::new();
	buf.try_reserve_exact(len).map_err(|_: TryReserveError| Error::Resource { len })?;
	Ok(buf)
}

fn check_completed(offset: u16, completed: io::Result<usize>, submitted: usize) -> Result<()> {
	match completed {
		Err(cause) => Err(Error::Bus { offset, cause }),
		Ok(completed) if completed < submitted => Err(Error::Transfer { offset, completed, submitted }),
		Ok(_) => Ok(()),
	}
}

pub struct Eeprom<E: TransactionExecutor> {
	bus: E,
	address: BusAddress,
	config: Config,
}

impl<E: TransactionExecutor> Eeprom<E> {
	pub fn new(bus: E, address: BusAddress, config: Config) -> Result<Self> {
		config.validate()?;
		Ok(Eeprom {
			bus,
			address,
			config,
		})
	}

	pub fn with_address(bus: E, address: u16, config: Config) -> Result<Self> {
		let address = BusAddress::new(address)?;
		Self::new(bus, address, config)
	}

	pub fn address(&self) -> BusAddress {
		self.address
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn bus(&self) -> &E {
		&self.bus
	}

	pub fn bus_mut(&mut self) -> &mut E {
		&mut self.bus
	}

	pub fn into_bus(self) -> E {
		self.bus
	}

	pub fn write(&mut self, data: &[u8]) -> Result<usize> {
		self.write_at(0, data)
	}

	/// On failure the pages before the failing one stay written; there is no
	/// way to undo them.
	pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
		let plan = TransferPlan::pages(offset, data.len(), self.config.page_size)?;
		let pages = plan.len();
		if pages == 0 {
			return Ok(0);
		}
		debug!("writing {} bytes at 0x{:04x} to {} in {} pages", data.len(), offset, self.address, pages);

		let mut frame = alloc_buffer(ADDRESS_WIDTH + self.config.page_size)?;
		let mut written = 0;
		for page in plan {
			frame.clear();
			frame.extend_from_slice(&page.offset_bytes());
			frame.extend_from_slice(&data[written..written + page.len]);

			let completed = self.bus.submit(&mut [Message::Write {
				address: self.address,
				data: &frame,
			}]);
			check_completed(page.offset, completed, 1)?;
			written += page.len;
			trace!("page 0x{:04x}: {} bytes", page.offset, page.len);

			self.bus.settle(self.config.settle_delay);
		}

		Ok(written)
	}

	pub fn read(&mut self, len: usize) -> Result<Vec<u8>> {
		self.read_at(0, len)
	}

	pub fn read_at(&mut self, offset: usize, len: usize) -> Result<Vec<u8>> {
		// reject bad ranges before sizing the buffer after them
		TransferPlan::reads(offset, len, self.config.read_chunk_size)?;
		let mut data = alloc_buffer(len)?;
		self.read_into(offset, len, &mut data)?;
		Ok(data)
	}

	/// If a chunk fails the sink keeps the chunks completed before it, so its
	/// content must be considered truncated.
	pub fn read_into<W: io::Write>(&mut self, offset: usize, len: usize, mut sink: W) -> Result<usize> {
		let plan = TransferPlan::reads(offset, len, self.config.read_chunk_size)?;
		let chunks = plan.len();
		if chunks == 0 {
			return Ok(0);
		}
		debug!("reading {} bytes at 0x{:04x} from {} in {} chunks", len, offset, self.address, chunks);

		let mut buf = alloc_buffer(self.config.read_chunk_size.min(len))?;
		let mut read = 0;
		for chunk in plan {
			buf.clear();
			buf.resize(chunk.len, 0);
			let offset_bytes = chunk.offset_bytes();

			let completed = self.bus.submit(&mut [
				Message::Write {
					address: self.address,
					data: &offset_bytes,
				},
				Message::Read {
					address: self.address,
					buffer: &mut buf,
				},
			]);
			check_completed(chunk.offset, completed, 2)?;

			sink.write_all(&buf).map_err(Error::Sink)?;
			read += chunk.len;
			trace!("chunk 0x{:04x}: {} bytes", chunk.offset, chunk.len);
		}
		sink.flush().map_err(Error::Sink)?;

		Ok(read)
	}

	/// Fills the first `capacity` bytes with the blank pattern.
	pub fn initialize(&mut self) -> Result<usize> {
		let mut blank = alloc_buffer(self.config.capacity)?;
		blank.resize(self.config.capacity, self.config.blank);
		info!("erasing {} bytes of {} with 0x{:02x}", blank.len(), self.address, self.config.blank);
		self.write(&blank)
	}

	pub fn verify_image(&mut self, image: &[u8]) -> Result<()> {
		let data = self.read(image.len())?;
		match image.iter().zip(data.iter()).position(|(expected, found)| expected != found) {
			None => Ok(()),
			Some(pos) => Err(Error::VerifyMismatch {
				offset: pos as u16,
				expected: image[pos],
				found: data[pos],
			}),
		}
	}

	pub fn round_trip(&mut self, record: TestRecord) -> Outcome {
		RoundTrip::new(record).run(self)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	use crate::i2c::{
		Direction,
		sim::{
			Event,
			SimulatedEeprom,
		},
	};

	const CHIP: u16 = 0x50;

	fn eeprom_with(config: Config, size: usize) -> Eeprom<SimulatedEeprom> {
		let address = BusAddress::new(CHIP).unwrap();
		let dev = SimulatedEeprom::new(address, size, config.page_size, config.settle_delay);
		Eeprom::new(dev, address, config).unwrap()
	}

	fn eeprom() -> Eeprom<SimulatedEeprom> {
		eeprom_with(Config::default(), ADDRESS_SPACE)
	}

	fn pattern(len: usize) -> Vec<u8> {
		(0..len).map(|i| (i * 7 + i / 256) as u8).collect()
	}

	// fails writes of chunks into the sink after `limit` bytes
	struct ShortSink {
		data: Vec<u8>,
		limit: usize,
	}

	impl io::Write for ShortSink {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			if self.data.len() + buf.len() > self.limit {
				return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
			}
			self.data.extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn write_hundred_bytes() {
		let mut ee = eeprom();
		let data = pattern(100);
		assert_eq!(ee.write(&data).unwrap(), 100);

		let dev = ee.bus();
		let transfers: Vec<_> = dev.transfers().collect();
		assert_eq!(transfers.len(), 4);
		let offsets = [0u16, 32, 64, 96];
		let lens = [32usize, 32, 32, 4];
		for (i, t) in transfers.iter().enumerate() {
			assert_eq!(t.len(), 1, "one page per transfer");
			assert_eq!(t[0].direction, Direction::Write);
			assert_eq!(t[0].address.get(), CHIP);
			assert_eq!(t[0].len, 2 + lens[i]);
			assert_eq!(&t[0].data[..2], &[(offsets[i] >> 8) as u8, offsets[i] as u8]);
			let start = offsets[i] as usize;
			assert_eq!(&t[0].data[2..], &data[start..start + lens[i]]);
		}
		assert_eq!(&dev.memory()[..100], &data[..]);
		assert_eq!(dev.memory()[100], 0xff);
	}

	#[test]
	fn settles_after_every_page() {
		let mut ee = eeprom();
		ee.write(&pattern(70)).unwrap();
		let events = ee.bus().events();
		assert_eq!(events.len(), 6);
		for pair in events.chunks(2) {
			match (&pair[0], &pair[1]) {
				(Event::Transfer(_), Event::Settle(d)) => assert_eq!(*d, DEFAULT_SETTLE_DELAY),
				other => panic!("expected transfer followed by settle, got {:?}", other),
			}
		}
	}

	#[test]
	fn write_without_settling_is_rejected() {
		let mut config = Config::default();
		config.settle_delay = Duration::from_micros(100);
		let address = BusAddress::new(CHIP).unwrap();
		// chip needs longer than configured
		let dev = SimulatedEeprom::new(address, 1024, 32, Duration::from_micros(5000));
		let mut ee = Eeprom::new(dev, address, config).unwrap();
		match ee.write(&pattern(64)) {
			Err(Error::Transfer { offset: 32, completed: 0, submitted: 1 }) => (),
			other => panic!("unexpected result {:?}", other),
		}
		// first page stays written
		assert_eq!(&ee.bus().memory()[..32], &pattern(64)[..32]);
	}

	#[test]
	fn empty_write() {
		let mut ee = eeprom();
		assert_eq!(ee.write(&[]).unwrap(), 0);
		assert_eq!(ee.bus().submissions(), 0);
		assert!(ee.bus().events().is_empty());
	}

	#[test]
	fn single_page_write() {
		let mut ee = eeprom();
		ee.write(&pattern(32)).unwrap();
		assert_eq!(ee.bus().transfers().count(), 1);
	}

	#[test]
	fn write_at_unaligned_offset() {
		let mut ee = eeprom();
		let data = pattern(50);
		assert_eq!(ee.write_at(0x6464, &data).unwrap(), 50);
		let lens: Vec<usize> = ee.bus().transfers().map(|t| t[0].len - 2).collect();
		assert_eq!(lens, vec![28, 22]);
		assert_eq!(&ee.bus().memory()[0x6464..0x6464 + 50], &data[..]);
	}

	#[test]
	fn write_failure_aborts_remaining_pages() {
		let mut ee = eeprom();
		ee.bus_mut().inject_fault(2, 0);
		let data = pattern(128);
		match ee.write(&data) {
			Err(Error::Transfer { offset, completed, submitted }) => {
				assert_eq!((offset, completed, submitted), (64, 0, 1));
			},
			other => panic!("unexpected result {:?}", other),
		}
		assert_eq!(ee.bus().submissions(), 3);
		let memory = ee.bus().memory();
		assert_eq!(&memory[..64], &data[..64]);
		assert!(memory[64..128].iter().all(|&b| b == 0xff));
	}

	#[test]
	fn write_out_of_range() {
		let mut ee = eeprom();
		match ee.write_at(0xfff0, &pattern(17)) {
			Err(Error::OutOfRange { offset: 0xfff0, len: 17 }) => (),
			other => panic!("unexpected result {:?}", other),
		}
		assert_eq!(ee.bus().submissions(), 0);
	}

	#[test]
	fn read_two_chunks() {
		let mut ee = eeprom();
		let data = pattern(8192);
		ee.bus_mut().memory_mut()[..8192].copy_from_slice(&data);
		assert_eq!(ee.read(8192).unwrap(), data);

		let transfers: Vec<_> = ee.bus().transfers().collect();
		assert_eq!(transfers.len(), 2);
		for (t, offset) in transfers.iter().zip(&[0u16, 4096]) {
			assert_eq!(t.len(), 2, "address and data phase in one transfer");
			assert_eq!(t[0].direction, Direction::Write);
			assert_eq!(t[0].data, vec![(offset >> 8) as u8, *offset as u8]);
			assert_eq!(t[1].direction, Direction::Read);
			assert_eq!(t[1].len, 4096);
		}
		// reads never settle
		assert!(ee.bus().events().iter().all(|e| match e { Event::Settle(_) => false, _ => true }));
	}

	#[test]
	fn read_short_last_chunk() {
		let mut config = Config::default();
		config.read_chunk_size = 64;
		let mut ee = eeprom_with(config, 1024);
		let data = pattern(150);
		ee.bus_mut().memory_mut()[10..160].copy_from_slice(&data);
		assert_eq!(ee.read_at(10, 150).unwrap(), data);
		let lens: Vec<usize> = ee.bus().transfers().map(|t| t[1].len).collect();
		assert_eq!(lens, vec![64, 64, 22]);
	}

	#[test]
	fn read_failure_keeps_completed_chunks_in_sink() {
		let mut config = Config::default();
		config.read_chunk_size = 16;
		let mut ee = eeprom_with(config, 1024);
		let data = pattern(64);
		ee.bus_mut().memory_mut()[..64].copy_from_slice(&data);
		ee.bus_mut().inject_fault(2, 1);

		let mut sink = Vec::new();
		match ee.read_into(0, 64, &mut sink) {
			Err(Error::Transfer { offset: 32, completed: 1, submitted: 2 }) => (),
			other => panic!("unexpected result {:?}", other),
		}
		assert_eq!(sink, &data[..32]);
		assert_eq!(ee.bus().submissions(), 3);

		ee.bus_mut().inject_fault(3, 0);
		let err = ee.read(64).unwrap_err();
		assert!(err.is_transfer());
		assert_eq!(err.offset(), Some(0));
	}

	#[test]
	fn read_sink_failure() {
		let mut config = Config::default();
		config.read_chunk_size = 16;
		let mut ee = eeprom_with(config, 1024);
		let mut sink = ShortSink { data: Vec::new(), limit: 40 };
		match ee.read_into(0, 64, &mut sink) {
			Err(Error::Sink(_)) => (),
			other => panic!("unexpected result {:?}", other),
		}
		assert_eq!(sink.data.len(), 32);
		assert_eq!(ee.bus().submissions(), 3);
	}

	#[test]
	fn read_oversized_len_is_out_of_range() {
		let mut ee = eeprom();
		for &len in &[ADDRESS_SPACE + 1, usize::max_value()] {
			match ee.read(len) {
				Err(Error::OutOfRange { offset: 0, len: l }) => assert_eq!(l, len),
				other => panic!("unexpected result {:?}", other),
			}
		}
		assert_eq!(ee.bus().submissions(), 0);
	}

	#[test]
	fn huge_buffer_is_a_resource_error() {
		match alloc_buffer(usize::max_value()) {
			Err(Error::Resource { len }) => assert_eq!(len, usize::max_value()),
			other => panic!("unexpected result {:?}", other),
		}
	}

	#[test]
	fn empty_read() {
		let mut ee = eeprom();
		assert!(ee.read(0).unwrap().is_empty());
		assert_eq!(ee.bus().submissions(), 0);
	}

	#[test]
	fn write_then_read_round_trip() {
		let mut config = Config::default();
		config.read_chunk_size = 100;
		let mut ee = eeprom_with(config, 8192);
		let data = pattern(1000);
		ee.write(&data).unwrap();
		assert_eq!(ee.read(data.len()).unwrap(), data);
		// repeated reads don't change anything
		assert_eq!(ee.read(data.len()).unwrap(), data);
		ee.verify_image(&data).unwrap();
	}

	#[test]
	fn initialize_blanks_capacity() {
		let mut config = Config::default();
		config.capacity = 256;
		config.blank = 0xa5;
		let mut ee = eeprom_with(config, 1024);
		assert_eq!(ee.initialize().unwrap(), 256);
		assert_eq!(ee.bus().transfers().count(), 256 / 32);
		let memory = ee.bus().memory();
		assert!(memory[..256].iter().all(|&b| b == 0xa5));
		assert!(memory[256..].iter().all(|&b| b == 0xff));
	}

	#[test]
	fn initialize_default_capacity() {
		let mut ee = eeprom();
		assert_eq!(ee.initialize().unwrap(), DEFAULT_CAPACITY);
		assert_eq!(ee.bus().transfers().count(), DEFAULT_CAPACITY / DEFAULT_PAGE_SIZE);
		assert!(ee.bus().memory()[..DEFAULT_CAPACITY].iter().all(|&b| b == 0x00));
	}

	#[test]
	fn verify_image_mismatch() {
		let mut ee = eeprom();
		let data = pattern(300);
		ee.write(&data).unwrap();
		ee.bus_mut().memory_mut()[201] ^= 0x10;
		match ee.verify_image(&data) {
			Err(Error::VerifyMismatch { offset: 201, expected, found }) => {
				assert_eq!(expected, data[201]);
				assert_eq!(found, data[201] ^ 0x10);
			},
			other => panic!("unexpected result {:?}", other),
		}
	}

	#[test]
	fn invalid_config() {
		let address = BusAddress::new(CHIP).unwrap();
		let dev = || SimulatedEeprom::new(address, 1024, 32, DEFAULT_SETTLE_DELAY);

		let mut config = Config::default();
		config.page_size = 0;
		assert!(Eeprom::new(dev(), address, config).is_err());

		let mut config = Config::default();
		config.read_chunk_size = 0x1_0000;
		assert!(Eeprom::new(dev(), address, config).is_err());

		let mut config = Config::default();
		config.capacity = ADDRESS_SPACE + 1;
		assert!(Eeprom::new(dev(), address, config).is_err());
	}

	#[test]
	fn reserved_chip_address() {
		let address = BusAddress::new(CHIP).unwrap();
		let dev = || SimulatedEeprom::new(address, 1024, 32, DEFAULT_SETTLE_DELAY);

		for &raw in &[0x03u16, 0x78, 0x1ff] {
			match Eeprom::with_address(dev(), raw, Config::default()) {
				Err(Error::InvalidAddress(_)) => (),
				Err(e) => panic!("unexpected error {:?}", e),
				Ok(_) => panic!("address 0x{:x} accepted", raw),
			}
		}
		let ee = Eeprom::with_address(dev(), CHIP, Config::default()).unwrap();
		assert_eq!(ee.address(), address);
	}
}
