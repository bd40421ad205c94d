use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{
	Path,
	PathBuf,
};

use libc::{
	c_ulong,
	ioctl,
};

use crate::i2c::{
	Message,
	TransactionExecutor,
	trace_messages,
};

/* from <linux/i2c-dev.h> and <linux/i2c.h> */
const I2C_FUNCS: c_ulong = 0x0705;
const I2C_RDWR: c_ulong = 0x0707;
const I2C_FUNC_I2C: c_ulong = 0x0000_0001;
const I2C_M_RD: u16 = 0x0001;

/// Kernel limit of messages in a single I2C_RDWR call.
pub const I2C_RDWR_IOCTL_MAX_MSGS: usize = 42;

#[allow(non_camel_case_types)]
#[repr(C)]
struct i2c_msg {
	addr: u16,
	flags: u16,
	len: u16,
	buf: *mut u8,
}

#[allow(non_camel_case_types)]
#[repr(C)]
struct i2c_rdwr_ioctl_data {
	msgs: *mut i2c_msg,
	nmsgs: u32,
}

#[derive(Debug)]
pub struct I2cBus {
	file: fs::File,
	path: PathBuf,
}

impl I2cBus {
	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn functionality(&self) -> io::Result<c_ulong> {
		let mut funcs: c_ulong = 0;
		let res = unsafe { ioctl(self.file.as_raw_fd(), I2C_FUNCS as _, &mut funcs as *mut c_ulong) };
		if res < 0 {
			return Err(io::Error::last_os_error());
		}
		Ok(funcs)
	}

	pub fn supports_plain_i2c(&self) -> io::Result<bool> {
		Ok(0 != self.functionality()? & I2C_FUNC_I2C)
	}
}

impl TransactionExecutor for I2cBus {
	fn submit(&mut self, messages: &mut [Message]) -> io::Result<usize> {
		if messages.is_empty() {
			return Ok(0);
		}
		if messages.len() > I2C_RDWR_IOCTL_MAX_MSGS {
			return Err(io::Error::new(
				io::ErrorKind::InvalidInput,
				format!("too many messages in one transfer: {} (max {})", messages.len(), I2C_RDWR_IOCTL_MAX_MSGS),
			));
		}

		let mut raw = Vec::with_capacity(messages.len());
		for msg in messages.iter_mut() {
			if msg.len() > u16::max_value() as usize {
				return Err(io::Error::new(
					io::ErrorKind::InvalidInput,
					format!("message too long: {} bytes", msg.len()),
				));
			}
			let addr = msg.address().get();
			let len = msg.len() as u16;
			raw.push(match msg {
				// the kernel only reads from buffers of write messages
				Message::Write { data, .. } => i2c_msg { addr, flags: 0, len, buf: data.as_ptr() as *mut u8 },
				Message::Read { buffer, .. } => i2c_msg { addr, flags: I2C_M_RD, len, buf: buffer.as_mut_ptr() },
			});
		}

		let mut rdwr = i2c_rdwr_ioctl_data {
			msgs: raw.as_mut_ptr(),
			nmsgs: raw.len() as u32,
		};
		let sent = unsafe { ioctl(self.file.as_raw_fd(), I2C_RDWR as _, &mut rdwr as *mut i2c_rdwr_ioctl_data) };
		if sent < 0 {
			return Err(io::Error::last_os_error());
		}
		let sent = sent as usize;
		if sent < messages.len() {
			warn!("{}: only {}/{} messages were sent", self.path.display(), sent, messages.len());
		}
		trace_messages(messages, sent);
		Ok(sent)
	}
}

pub fn inner_open(path: PathBuf) -> io::Result<I2cBus> {
	let file = fs::OpenOptions::new()
		.read(true)
		.write(true)
		.open(&path)?;

	Ok(I2cBus {
		file,
		path,
	})
}
