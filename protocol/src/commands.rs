//! Commands sent to devices on the bus
//!
//! Commands are fire-and-forget: the bus has no notion of a response. Queries such as
//! [`Command::GiveAudioStatus`] are answered, if at all, by a separate report frame which is
//! decoded into an [`crate::Event`].

use bytes::Bytes;

use crate::{
    address::{LogicalAddress, PhysicalAddress},
    frame::{Frame, ParseError, MAX_PARAMS},
    opcode::{Opcode, UserControlCode},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// 0x8F: Ask a device for its power status
    GiveDevicePowerStatus,

    /// 0x71: Ask the audio system for its volume and mute status
    GiveAudioStatus,

    /// 0x82: Announce the given physical address as the active source
    ActiveSource(PhysicalAddress),

    /// 0x36: Put the destination (or everything, if broadcast) in standby
    Standby,

    /// 0x04: Turn on the display
    ImageViewOn,

    /// 0x44: Remote control button press
    UserControlPressed(UserControlCode),

    /// 0x45: Remote control button release
    UserControlRelease,

    /// 0x46: Ask a device for its on-screen display name
    GiveOsdName,

    /// 0x83: Ask a device for its physical address
    GivePhysicalAddress,

    /// 0x85: Ask the current active source to announce itself
    RequestActiveSource,

    /// Any other opcode with verbatim parameters
    Raw { opcode: Opcode, params: Bytes },
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::GiveDevicePowerStatus => Opcode::GiveDevicePowerStatus,
            Command::GiveAudioStatus => Opcode::GiveAudioStatus,
            Command::ActiveSource(_) => Opcode::ActiveSource,
            Command::Standby => Opcode::Standby,
            Command::ImageViewOn => Opcode::ImageViewOn,
            Command::UserControlPressed(_) => Opcode::UserControlPressed,
            Command::UserControlRelease => Opcode::UserControlRelease,
            Command::GiveOsdName => Opcode::GiveOsdName,
            Command::GivePhysicalAddress => Opcode::GivePhysicalAddress,
            Command::RequestActiveSource => Opcode::RequestActiveSource,
            Command::Raw { opcode, .. } => *opcode,
        }
    }

    pub fn params(&self) -> Bytes {
        match self {
            Command::ActiveSource(addr) => Bytes::copy_from_slice(&addr.to_bytes()),
            Command::UserControlPressed(code) => Bytes::copy_from_slice(&[code.to_u8()]),
            Command::Raw { params, .. } => params.clone(),
            _ => Bytes::new(),
        }
    }

    /// Commands that are only meaningful when broadcast
    pub fn is_broadcast_only(&self) -> bool {
        matches!(
            self,
            Command::ActiveSource(_) | Command::RequestActiveSource
        )
    }

    pub fn to_frame(&self, initiator: LogicalAddress, destination: LogicalAddress) -> Frame {
        Frame::new(initiator, destination, self.opcode(), self.params())
    }

    /// Builds a raw command from hex text, as in `44:41` (opcode followed by its parameters)
    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        let data = crate::frame::parse_hex(s)?;
        let (&opcode, params) = data.split_first().ok_or(ParseError::EmptyFrame)?;
        if params.len() > MAX_PARAMS {
            return Err(ParseError::InvalidHex(s.to_string()));
        }
        Ok(Command::Raw {
            opcode: Opcode::from_u8(opcode),
            params: Bytes::copy_from_slice(params),
        })
    }

    /// Interprets a received frame as a command. Unknown or malformed commands are kept raw.
    pub fn from_frame(frame: &Frame) -> Self {
        let params = &frame.params;
        match frame.opcode {
            Opcode::GiveDevicePowerStatus => Command::GiveDevicePowerStatus,
            Opcode::GiveAudioStatus => Command::GiveAudioStatus,
            Opcode::ActiveSource if params.len() >= 2 => {
                Command::ActiveSource(PhysicalAddress::from_bytes(params[0], params[1]))
            }
            Opcode::Standby => Command::Standby,
            Opcode::ImageViewOn => Command::ImageViewOn,
            Opcode::UserControlPressed if !params.is_empty() => {
                Command::UserControlPressed(UserControlCode::from_u8(params[0]))
            }
            Opcode::UserControlRelease => Command::UserControlRelease,
            Opcode::GiveOsdName => Command::GiveOsdName,
            Opcode::GivePhysicalAddress => Command::GivePhysicalAddress,
            Opcode::RequestActiveSource => Command::RequestActiveSource,
            opcode => Command::Raw {
                opcode,
                params: params.clone(),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_frames() {
        let e = LogicalAddress::FreeUse;
        let cases: &[(Command, LogicalAddress, &[u8])] = &[
            (Command::GiveDevicePowerStatus, LogicalAddress::Tv, &hex!("e0 8f")[..]),
            (Command::GiveAudioStatus, LogicalAddress::AudioSystem, &hex!("e5 71")[..]),
            (
                Command::ActiveSource(PhysicalAddress(0x1142)),
                LogicalAddress::Broadcast,
                &hex!("ef 82 11 42")[..],
            ),
            (Command::Standby, LogicalAddress::Tv, &hex!("e0 36")[..]),
            (Command::ImageViewOn, LogicalAddress::Tv, &hex!("e0 04")[..]),
            (
                Command::UserControlPressed(UserControlCode::VolumeUp),
                LogicalAddress::AudioSystem,
                &hex!("e5 44 41")[..],
            ),
            (Command::UserControlRelease, LogicalAddress::AudioSystem, &hex!("e5 45")[..]),
        ];

        for (cmd, dest, expected) in cases {
            let frame = cmd.to_frame(e, *dest);
            assert_eq!(frame.to_bytes().as_ref(), *expected, "{:?}", cmd);
            assert_eq!(&Command::from_frame(&frame), cmd);
        }
    }

    #[test]
    fn test_from_hex() {
        let cmd = Command::from_hex("44:43").unwrap();
        assert_eq!(cmd.opcode(), Opcode::UserControlPressed);
        assert_eq!(cmd.params().as_ref(), &[0x43]);
        assert!(Command::from_hex("").is_err());
        assert!(Command::from_hex("44:4g").is_err());
    }
}
