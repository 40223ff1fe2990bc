//! Opcodes and user control codes
//!
//! Values are protocol constants and must not change. Values this crate doesn't know about are
//! preserved as `Unknown` so frames can be forwarded or logged verbatim.

use core::fmt;

macro_rules! byte_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )*
            Unknown(u8),
        }

        impl $name {
            pub fn from_u8(value: u8) -> Self {
                match value {
                    $( $value => $name::$variant, )*
                    other => $name::Unknown(other),
                }
            }

            pub fn to_u8(self) -> u8 {
                match self {
                    $( $name::$variant => $value, )*
                    $name::Unknown(other) => other,
                }
            }
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                Self::from_u8(value)
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                value.to_u8()
            }
        }
    };
}

byte_enum! {
    /// Message type identifier, the first byte following the header
    pub enum Opcode {
        FeatureAbort = 0x00,
        ImageViewOn = 0x04,
        TextViewOn = 0x0D,
        Standby = 0x36,
        UserControlPressed = 0x44,
        UserControlRelease = 0x45,
        GiveOsdName = 0x46,
        SetOsdName = 0x47,
        SystemAudioModeRequest = 0x70,
        GiveAudioStatus = 0x71,
        SetSystemAudioMode = 0x72,
        ReportAudioStatus = 0x7A,
        GiveSystemAudioModeStatus = 0x7D,
        SystemAudioModeStatus = 0x7E,
        RoutingChange = 0x80,
        RoutingInformation = 0x81,
        ActiveSource = 0x82,
        GivePhysicalAddress = 0x83,
        ReportPhysicalAddress = 0x84,
        RequestActiveSource = 0x85,
        SetStreamPath = 0x86,
        DeviceVendorId = 0x87,
        VendorCommand = 0x89,
        GiveDeviceVendorId = 0x8C,
        MenuStatus = 0x8E,
        GiveDevicePowerStatus = 0x8F,
        ReportPowerStatus = 0x90,
        InactiveSource = 0x9D,
        CecVersion = 0x9E,
        GetCecVersion = 0x9F,
        Abort = 0xFF,
    }
}

byte_enum! {
    /// Remote control button identifiers carried by `UserControlPressed`
    pub enum UserControlCode {
        Select = 0x00,
        Up = 0x01,
        Down = 0x02,
        Left = 0x03,
        Right = 0x04,
        Exit = 0x0D,
        Power = 0x40,
        VolumeUp = 0x41,
        VolumeDown = 0x42,
        Mute = 0x43,
        Play = 0x44,
        Stop = 0x45,
        Pause = 0x46,
        PowerToggle = 0x6B,
        PowerOff = 0x6C,
        PowerOn = 0x6D,
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Unknown(v) => write!(f, "Unknown(0x{:02x})", v),
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_values() {
        assert_eq!(Opcode::GiveDevicePowerStatus.to_u8(), 0x8F);
        assert_eq!(Opcode::GiveAudioStatus.to_u8(), 0x71);
        assert_eq!(Opcode::ActiveSource.to_u8(), 0x82);
        assert_eq!(Opcode::Standby.to_u8(), 0x36);
        assert_eq!(Opcode::ImageViewOn.to_u8(), 0x04);
        assert_eq!(Opcode::UserControlPressed.to_u8(), 0x44);
        assert_eq!(Opcode::UserControlRelease.to_u8(), 0x45);
        assert_eq!(Opcode::ReportPowerStatus.to_u8(), 0x90);
        assert_eq!(Opcode::ReportAudioStatus.to_u8(), 0x7A);
        assert_eq!(Opcode::RoutingChange.to_u8(), 0x80);
        assert_eq!(Opcode::SetOsdName.to_u8(), 0x47);
        assert_eq!(Opcode::ReportPhysicalAddress.to_u8(), 0x84);

        assert_eq!(UserControlCode::VolumeUp.to_u8(), 0x41);
        assert_eq!(UserControlCode::VolumeDown.to_u8(), 0x42);
        assert_eq!(UserControlCode::Mute.to_u8(), 0x43);
        assert_eq!(UserControlCode::PowerOn.to_u8(), 0x6D);
    }

    #[test]
    fn test_unknown_preserved() {
        let op = Opcode::from_u8(0xA0);
        assert_eq!(op, Opcode::Unknown(0xA0));
        assert_eq!(op.to_u8(), 0xA0);
        assert_eq!(Opcode::from_u8(0x7A), Opcode::ReportAudioStatus);
    }
}
