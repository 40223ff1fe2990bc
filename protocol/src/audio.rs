//! Audio status as carried by `ReportAudioStatus`

#[cfg(feature = "use_serde")]
use serde::{Deserialize, Serialize};

/// Volume level and mute state of an audio system
///
/// On the wire this is a single byte: the high bit is the mute flag and the 7 low bits are the
/// volume level (nominally 0-100).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "use_serde",
    derive(Serialize, Deserialize, schemars::JsonSchema)
)]
pub struct AudioStatus {
    pub level: u8,
    pub muted: bool,
}

impl AudioStatus {
    pub fn new(level: u8, muted: bool) -> Self {
        Self { level, muted }
    }

    /// Decodes the raw status byte
    pub fn from_byte(b: u8) -> Self {
        if b > 127 {
            AudioStatus {
                level: b - 128,
                muted: true,
            }
        } else {
            AudioStatus {
                level: b,
                muted: false,
            }
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut b = self.level & 0x7F;
        if self.muted {
            b |= 1 << 7;
        }
        b
    }
}

impl From<u8> for AudioStatus {
    fn from(b: u8) -> Self {
        Self::from_byte(b)
    }
}
