//! Logical (4-bit role) and physical (16-bit topology) bus addresses

use core::{convert::TryFrom, fmt, str::FromStr};

#[cfg(feature = "use_serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::frame::ParseError;

/// Logical address of a device on the bus. There are always exactly 16 of them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
#[cfg_attr(
    feature = "use_serde",
    derive(Serialize, Deserialize, schemars::JsonSchema)
)]
#[repr(u8)]
pub enum LogicalAddress {
    Tv = 0x0,
    RecordingDevice1 = 0x1,
    RecordingDevice2 = 0x2,
    Tuner1 = 0x3,
    PlaybackDevice1 = 0x4,
    AudioSystem = 0x5,
    Tuner2 = 0x6,
    Tuner3 = 0x7,
    PlaybackDevice2 = 0x8,
    RecordingDevice3 = 0x9,
    Tuner4 = 0xA,
    PlaybackDevice3 = 0xB,
    Reserved1 = 0xC,
    Reserved2 = 0xD,
    FreeUse = 0xE,
    Broadcast = 0xF,
}

impl LogicalAddress {
    pub const COUNT: usize = 16;

    /// Builds an address from the low nibble of `value`
    pub fn from_nibble(value: u8) -> Self {
        // Every nibble value maps to a variant
        Self::iter()
            .nth((value & 0x0F) as usize)
            .unwrap_or(LogicalAddress::Broadcast)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn all() -> impl Iterator<Item = LogicalAddress> {
        Self::iter()
    }
}

impl TryFrom<u8> for LogicalAddress {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > 0x0F {
            return Err(ParseError::InvalidLogicalAddress(value));
        }
        Ok(Self::from_nibble(value))
    }
}

impl From<LogicalAddress> for u8 {
    fn from(addr: LogicalAddress) -> Self {
        addr.as_u8()
    }
}

impl fmt::Display for LogicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.as_u8())
    }
}

/// Physical address, encoding a device's position in the HDMI topology as four nibbles (a.b.c.d)
///
/// Serialized in its dotted form. Deserialization also accepts hex strings and plain integers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PhysicalAddress(pub u16);

impl PhysicalAddress {
    /// Reserved value reported by devices that don't know their position yet
    pub const INVALID: PhysicalAddress = PhysicalAddress(0xFFFF);

    pub fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// Big endian representation, as carried in frame payloads
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(hi: u8, lo: u8) -> Self {
        Self(u16::from_be_bytes([hi, lo]))
    }
}

impl From<u16> for PhysicalAddress {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:x}.{:x}.{:x}.{:x}",
            (v >> 12) & 0xF,
            (v >> 8) & 0xF,
            (v >> 4) & 0xF,
            v & 0xF
        )
    }
}

impl FromStr for PhysicalAddress {
    type Err = ParseError;

    /// Accepts the dotted form (`1.1.4.2`), or four hex digits with an optional `0x` prefix
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidPhysicalAddress(s.to_string());
        let s = s.trim();

        if s.contains('.') {
            let nibbles = s
                .split('.')
                .map(|part| u8::from_str_radix(part, 16).ok().filter(|&n| n <= 0xF))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(invalid)?;
            if nibbles.len() != 4 {
                return Err(invalid());
            }
            let value = nibbles
                .iter()
                .fold(0u16, |acc, &nibble| (acc << 4) | nibble as u16);
            return Ok(Self(value));
        }

        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() || digits.len() > 4 {
            return Err(invalid());
        }
        u16::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| invalid())
    }
}

#[cfg(feature = "use_serde")]
impl Serialize for PhysicalAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "use_serde")]
impl<'de> Deserialize<'de> for PhysicalAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u16),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(PhysicalAddress(n)),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(feature = "use_serde")]
impl schemars::JsonSchema for PhysicalAddress {
    fn schema_name() -> String {
        "PhysicalAddress".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_logical_address() {
        assert_eq!(LogicalAddress::from_nibble(0x5), LogicalAddress::AudioSystem);
        assert_eq!(LogicalAddress::from_nibble(0xE5), LogicalAddress::AudioSystem);
        assert_eq!(LogicalAddress::all().count(), LogicalAddress::COUNT);
        assert!(LogicalAddress::try_from(0x10).is_err());
        for (i, addr) in LogicalAddress::all().enumerate() {
            assert_eq!(addr.index(), i);
        }
    }

    #[test]
    fn test_physical_address() {
        let addr: PhysicalAddress = "1.1.4.2".parse().unwrap();
        assert_eq!(addr, PhysicalAddress(0x1142));
        assert_eq!(addr.to_string(), "1.1.4.2");
        assert_eq!(addr.to_bytes(), [0x11, 0x42]);

        assert_eq!("0x1142".parse::<PhysicalAddress>().unwrap(), addr);
        assert_eq!("1142".parse::<PhysicalAddress>().unwrap(), addr);
        assert!("1.1.4".parse::<PhysicalAddress>().is_err());
        assert!("1.1.4.16".parse::<PhysicalAddress>().is_err());
        assert!("TV".parse::<PhysicalAddress>().is_err());
        assert!("0x11420".parse::<PhysicalAddress>().is_err());
    }
}
