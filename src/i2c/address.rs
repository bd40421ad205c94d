use std::fmt;
use std::str;

pub const MIN_ADDRESS: u16 = 0x08;
pub const MAX_ADDRESS: u16 = 0x77;

#[derive(Debug, Fail)]
pub enum AddressError {
	#[fail(display = "chip address is not a number: {:?}", _0)]
	NotANumber(String),
	#[fail(display = "chip address 0x{:02x} out of range (0x08-0x77)", _0)]
	OutOfRange(u64),
}

/// 7-bit chip address on the bus; always within `MIN_ADDRESS..=MAX_ADDRESS`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusAddress(u16);

impl BusAddress {
	pub fn new(address: u16) -> Result<Self, AddressError> {
		if address < MIN_ADDRESS || address > MAX_ADDRESS {
			return Err(AddressError::OutOfRange(address as u64));
		}
		Ok(BusAddress(address))
	}

	pub fn get(&self) -> u16 {
		self.0
	}
}

impl fmt::Debug for BusAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "BusAddress(0x{:02x})", self.0)
	}
}

impl fmt::Display for BusAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl str::FromStr for BusAddress {
	type Err = AddressError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let value = crate::parse_number(s).map_err(|_| AddressError::NotANumber(s.into()))?;
		if value < MIN_ADDRESS as u64 || value > MAX_ADDRESS as u64 {
			return Err(AddressError::OutOfRange(value));
		}
		Ok(BusAddress(value as u16))
	}
}

#[cfg(test)]
mod test {
	use super::BusAddress;

	fn check_address(address: u16, repr: &str) {
		match repr.parse::<BusAddress>() {
			Err(e) => panic!("{} failed to parse as BusAddress: {}", repr, e),
			Ok(a) => assert_eq!(address, a.get(), "failed validating parsed {}", repr),
		}
	}

	fn check_invalid_address(repr: &str) {
		assert!(repr.parse::<BusAddress>().is_err(), "{:?} must not be a valid chip address", repr);
	}

	#[test]
	fn parse_address() {
		check_address(0x08, "0x08");
		check_address(0x50, "0x50");
		check_address(0x50, "80");
		check_address(0x50, "0120");
		check_address(0x77, "0x77");
		check_invalid_address("");
		check_invalid_address("0x");
		check_invalid_address("0x07");
		check_invalid_address("0x78");
		check_invalid_address("0x50z");
		check_invalid_address("-1");
	}

	#[test]
	fn new_rejects_reserved() {
		assert!(BusAddress::new(0x00).is_err());
		assert!(BusAddress::new(0x07).is_err());
		assert!(BusAddress::new(0x78).is_err());
		assert!(BusAddress::new(0x7f).is_err());
		assert_eq!(BusAddress::new(0x50).unwrap().to_string(), "0x50");
	}
}
