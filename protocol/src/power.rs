//! Power states reported by `ReportPowerStatus`

#[cfg(feature = "use_serde")]
use serde::{Deserialize, Serialize};

/// Last known power state of a device
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString)]
#[cfg_attr(
    feature = "use_serde",
    derive(Serialize, Deserialize, schemars::JsonSchema)
)]
#[cfg_attr(feature = "use_serde", serde(rename_all = "lowercase"))]
#[strum(serialize_all = "lowercase")]
pub enum PowerStatus {
    On,
    Standby,
    #[default]
    Unknown,
}

impl PowerStatus {
    /// Decodes the status byte. The two transitional values don't describe a settled state and
    /// decode to `None`.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(PowerStatus::On),
            0x01 => Some(PowerStatus::Standby),
            _ => None,
        }
    }

    pub fn is_on(self) -> bool {
        self == PowerStatus::On
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode() {
        assert_eq!(PowerStatus::from_byte(0), Some(PowerStatus::On));
        assert_eq!(PowerStatus::from_byte(1), Some(PowerStatus::Standby));
        assert_eq!(PowerStatus::from_byte(2), None);
        assert_eq!(PowerStatus::from_byte(3), None);
        assert_eq!(PowerStatus::default(), PowerStatus::Unknown);
        assert_eq!(PowerStatus::On.to_string(), "on");
    }
}
