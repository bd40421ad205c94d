#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

macro_rules! with_context {
	(( $fmt:tt $($t:tt)* ), $e:expr) => {{
		use failure::Error;

		match (|| { $e })() {
			Ok(v) => Ok(v),
			Err(e) => {
				let e: Error = e;
				let msg = format!(concat!($fmt, ": {}") $($t)*, e);
				Err(Error::from(e.context(msg)))
			}
		}
	}};

	($msg:expr, $e:expr) => {
		with_context!(("{}", $msg), $e)
	};
}

pub type AResult<T> = Result<T, failure::Error>;

pub mod eeprom;
pub mod i2c;

/// Parse an unsigned number the way `strtoul(s, _, 0)` does: `0x` prefix
/// for hex, leading `0` for octal, decimal otherwise.
pub fn parse_number(s: &str) -> AResult<u64> {
	let s = s.trim();
	ensure!(!s.is_empty(), "empty number");
	with_context!(("invalid number {:?}", s), {
		if s.starts_with("0x") || s.starts_with("0X") {
			Ok(u64::from_str_radix(&s[2..], 16)?)
		} else if s.len() > 1 && s.starts_with('0') {
			Ok(u64::from_str_radix(&s[1..], 8)?)
		} else {
			Ok(s.parse::<u64>()?)
		}
	})
}
