use std::io;
use std::path::PathBuf;

mod dev;

pub use self::dev::{
	I2cBus,
	I2C_RDWR_IOCTL_MAX_MSGS,
};

/// Highest bus number accepted, same bound as i2c-tools.
pub const MAX_BUS_NUMBER: u32 = 0xFFFFF;

pub fn parse_bus_number(s: &str) -> crate::AResult<u32> {
	let bus = crate::parse_number(s)?;
	ensure!(bus <= MAX_BUS_NUMBER as u64, "I2C bus out of range: {}", bus);
	Ok(bus as u32)
}

fn open_first(bus: u32) -> io::Result<I2cBus> {
	match dev::inner_open(PathBuf::from(format!("/dev/i2c/{}", bus))) {
		Err(ref e) if e.kind() == io::ErrorKind::NotFound => (),
		// ENOTDIR: `/dev/i2c` exists but isn't a directory
		Err(ref e) if e.raw_os_error() == Some(libc::ENOTDIR) => (),
		r => return r,
	}
	dev::inner_open(PathBuf::from(format!("/dev/i2c-{}", bus)))
}

/// Opens `/dev/i2c/N` (or `/dev/i2c-N`) and makes sure the adapter can do
/// plain I2C transfers.
pub fn open_bus(bus: u32) -> crate::AResult<I2cBus> {
	let dev = match open_first(bus) {
		Ok(dev) => dev,
		Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
			bail!("Could not open file `/dev/i2c-{}' or `/dev/i2c/{}': {}", bus, bus, e);
		},
		Err(ref e) if e.kind() == io::ErrorKind::PermissionDenied => {
			bail!("Could not open file `/dev/i2c-{}': {} (run as root?)", bus, e);
		},
		Err(e) => bail!("Could not open I2C bus {}: {}", bus, e),
	};

	let funcs = with_context!(("could not get the adapter functionality matrix of {}", dev.path().display()), {
		Ok(dev.supports_plain_i2c()?)
	})?;
	ensure!(funcs, "Adapter {} does not have I2C transfers capability", dev.path().display());
	debug!("opened {}", dev.path().display());

	Ok(dev)
}
