#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate i2c_eeprom_flash;
use i2c_eeprom_flash::*;

use failure::ResultExt;

use std::fs;
use std::io::{
	self,
	Write,
};
use std::process::exit;
use std::time::{
	Duration,
	Instant,
};

use i2c_eeprom_flash::eeprom::{
	ADDRESS_SPACE,
	Config,
	Eeprom,
	TestRecord,
};
use i2c_eeprom_flash::i2c::{
	BusAddress,
	TransactionExecutor,
};

type Device = Eeprom<Box<dyn TransactionExecutor>>;

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_number(matches: &clap::ArgMatches, name: &str) -> AResult<Option<usize>> {
	match matches.value_of(name) {
		None => Ok(None),
		Some(p) => with_number_context(name, parse_number(p)).map(|n| Some(n as usize)),
	}
}

fn with_number_context(name: &str, r: AResult<u64>) -> AResult<u64> {
	r.map_err(|e| {
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn config_from(matches: &clap::ArgMatches) -> AResult<Config> {
	let mut config = Config::default();
	if let Some(n) = get_number(matches, "page_size")? {
		config.page_size = n;
	}
	if let Some(n) = get_number(matches, "read_chunk")? {
		config.read_chunk_size = n;
	}
	if let Some(n) = get_number(matches, "settle_us")? {
		config.settle_delay = Duration::from_micros(n as u64);
	}
	if let Some(n) = get_number(matches, "capacity")? {
		config.capacity = n;
	}
	if let Some(n) = get_number(matches, "blank")? {
		ensure!(n <= 0xff, "blank pattern must be a byte: 0x{:x}", n);
		config.blank = n as u8;
	}
	config.validate()?;
	Ok(config)
}

fn open_device(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<Device> {
	let config = config_from(matches)?;
	let address: BusAddress = get_param(sub_m, "ADDRESS")?;
	let bus_arg = match sub_m.value_of("BUS") {
		Some(b) => b,
		None => bail!("missing parameter BUS"),
	};
	let bus = i2c::linux::parse_bus_number(bus_arg)?;

	let executor: Box<dyn TransactionExecutor> = if matches.is_present("simulate") {
		warn!("using a simulated EEPROM instead of I2C bus {}", bus);
		let size = ADDRESS_SPACE - ADDRESS_SPACE % config.page_size;
		Box::new(i2c::sim::SimulatedEeprom::new(address, size, config.page_size, config.settle_delay))
	} else {
		Box::new(i2c::linux::open_bus(bus)?)
	};

	Ok(Eeprom::new(executor, address, config)?)
}

fn write_image(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<()> {
	let image_path = match sub_m.value_of("IMAGE") {
		Some(p) => p,
		None => bail!("missing parameter IMAGE"),
	};
	let image = fs::read(image_path).context(format!("couldn't read image file {}", image_path))?;
	ensure!(image.len() <= ADDRESS_SPACE, "image file {} too large: {} bytes (max {})", image_path, image.len(), ADDRESS_SPACE);

	let mut ee = open_device(matches, sub_m)?;
	if sub_m.is_present("erase") {
		ee.initialize()?;
	}
	let written = ee.write(&image)?;
	info!("{}: wrote {} bytes from {}", ee.address(), written, image_path);

	if sub_m.is_present("verify") {
		ee.verify_image(&image)?;
		info!("{}: image verified successfully", ee.address());
	}

	Ok(())
}

fn read_image(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<()> {
	let output_path = match sub_m.value_of("OUTPUT") {
		Some(p) => p,
		None => bail!("missing parameter OUTPUT"),
	};
	let mut ee = open_device(matches, sub_m)?;
	let len = get_number(sub_m, "length")?.unwrap_or(ee.config().capacity);

	let read = if output_path == "-" {
		let stdout = io::stdout();
		let mut lock = stdout.lock();
		ee.read_into(0, len, &mut lock)?
	} else {
		let file = fs::File::create(output_path).context(format!("couldn't create output file {}", output_path))?;
		let mut out = io::BufWriter::new(file);
		let read = ee.read_into(0, len, &mut out)?;
		out.flush()?;
		read
	};
	info!("{}: read {} bytes into {}", ee.address(), read, output_path);

	Ok(())
}

fn erase(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<()> {
	let mut ee = open_device(matches, sub_m)?;
	let written = ee.initialize()?;
	info!("{}: erased {} bytes", ee.address(), written);
	Ok(())
}

fn round_trip(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches) -> AResult<()> {
	let mut ee = open_device(matches, sub_m)?;
	ee.round_trip(TestRecord::default()).into_result()?;
	println!("i2c write/read test succeeded");
	Ok(())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg page_size: --("page-size") +takes_value "EEPROM page size in bytes (default 32)")
		(@arg read_chunk: --("read-chunk") +takes_value "bytes per read transfer (default 4096)")
		(@arg settle_us: --("settle-us") +takes_value "write cycle time in microseconds (default 1700)")
		(@arg capacity: --capacity +takes_value "EEPROM size in bytes (default 8192)")
		(@arg blank: --blank +takes_value "byte pattern used for erasing (default 0x00)")
		(@arg simulate: --simulate "use an in-memory EEPROM instead of the I2C bus")
		(@subcommand write =>
			(about: "write image file to EEPROM")
			(@arg erase: -e --erase "erase the whole EEPROM first")
			(@arg verify: -v --verify "read back and compare after writing")
			(@arg BUS: +required "I2C bus number (/dev/i2c-N)")
			(@arg ADDRESS: +required "chip address (0x08-0x77)")
			(@arg IMAGE: +required "image file to write")
		)
		(@subcommand read =>
			(about: "dump EEPROM into file ('-' for stdout)")
			(@arg length: -l --length +takes_value "number of bytes to read (default: capacity)")
			(@arg BUS: +required "I2C bus number (/dev/i2c-N)")
			(@arg ADDRESS: +required "chip address (0x08-0x77)")
			(@arg OUTPUT: +required "output file")
		)
		(@subcommand erase =>
			(about: "fill EEPROM with the blank pattern")
			(@arg BUS: +required "I2C bus number (/dev/i2c-N)")
			(@arg ADDRESS: +required "chip address (0x08-0x77)")
		)
		(@subcommand test =>
			(about: "write and read back a test record")
			(@arg BUS: +required "I2C bus number (/dev/i2c-N)")
			(@arg ADDRESS: +required "chip address (0x08-0x77)")
		)
	).get_matches();

	match matches.subcommand() {
		("write", Some(sub_m)) => {
			write_image(&matches, sub_m)
		},
		("read", Some(sub_m)) => {
			read_image(&matches, sub_m)
		},
		("erase", Some(sub_m)) => {
			erase(&matches, sub_m)
		},
		("test", Some(sub_m)) => {
			round_trip(&matches, sub_m)
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let start = Instant::now();
	let res = main_app();
	info!("running time is {:?}", start.elapsed());

	if let Err(e) = res {
		error!("Error: {}", e);
		exit(1);
	}
}
