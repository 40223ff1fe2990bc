//! Functions for parsing and formatting bus frames
//!
//! A frame is a header byte (initiator in the high nibble, destination in the low nibble),
//! followed by an optional opcode and its parameters. A header-only frame is a polling message and
//! carries no data.
//!
//! Frames are commonly represented as colon separated hex bytes (`e5:71`), which is also the format
//! used by `cec-client` for both its traffic log and its `tx` command.

use core::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::{LogicalAddress, Opcode};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("frame was empty")]
    EmptyFrame,

    #[error("frame has no opcode (polling message)")]
    MissingOpcode,

    #[error("invalid hex frame: {0:?}")]
    InvalidHex(String),

    #[error("invalid logical address: {0}")]
    InvalidLogicalAddress(u8),

    #[error("invalid physical address: {0:?}")]
    InvalidPhysicalAddress(String),

    #[error("{opcode}: expected at least {expected} parameter bytes, got {actual}")]
    UnexpectedLength {
        opcode: Opcode,
        expected: usize,
        actual: usize,
    },
}

/// Maximum number of parameter bytes a single frame can carry
pub const MAX_PARAMS: usize = 14;

#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub initiator: LogicalAddress,
    pub destination: LogicalAddress,
    pub opcode: Opcode,
    pub params: Bytes,
}

impl Frame {
    pub fn new(
        initiator: LogicalAddress,
        destination: LogicalAddress,
        opcode: Opcode,
        params: impl Into<Bytes>,
    ) -> Self {
        Frame {
            initiator,
            destination,
            opcode,
            params: params.into(),
        }
    }

    pub fn header(&self) -> u8 {
        (self.initiator.as_u8() << 4) | self.destination.as_u8()
    }

    pub fn is_broadcast(&self) -> bool {
        self.destination == LogicalAddress::Broadcast
    }

    /// Parses a raw frame, including its header byte
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Result<Self, ParseError> {
        let data = data.as_ref();
        let (&header, rest) = data.split_first().ok_or(ParseError::EmptyFrame)?;
        let (&opcode, params) = rest.split_first().ok_or(ParseError::MissingOpcode)?;

        Ok(Frame {
            initiator: LogicalAddress::from_nibble(header >> 4),
            destination: LogicalAddress::from_nibble(header),
            opcode: Opcode::from_u8(opcode),
            params: Bytes::copy_from_slice(params),
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + self.params.len());
        buf.put_u8(self.header());
        buf.put_u8(self.opcode.to_u8());
        buf.extend_from_slice(&self.params);
        buf.freeze()
    }

    /// Parses a colon separated hex frame such as `0f:82:11:42`
    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        Self::from_bytes(parse_hex(s)?)
    }

    /// Formats this frame as colon separated uppercase hex, `E5:71`
    pub fn to_hex(&self) -> String {
        format_hex(&self.to_bytes())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame {{ {:?} -> {:?}, {}, params: {:02x?} }}",
            self.initiator,
            self.destination,
            self.opcode,
            self.params.as_ref()
        )
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Parses colon (or space) separated hex bytes
pub fn parse_hex(s: &str) -> Result<Vec<u8>, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseError::EmptyFrame);
    }

    s.split(|c| c == ':' || c == ' ')
        .filter(|part| !part.is_empty())
        .map(|part| {
            if part.len() > 2 {
                return Err(ParseError::InvalidHex(s.to_string()));
            }
            u8::from_str_radix(part, 16).map_err(|_| ParseError::InvalidHex(s.to_string()))
        })
        .collect()
}

pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod test {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_parse() {
        let frame = Frame::from_bytes(hex!("50 7a 32")).unwrap();
        assert_eq!(frame.initiator, LogicalAddress::AudioSystem);
        assert_eq!(frame.destination, LogicalAddress::Tv);
        assert_eq!(frame.opcode, Opcode::ReportAudioStatus);
        assert_eq!(frame.params.as_ref(), &[0x32]);
        assert_eq!(frame.to_bytes().as_ref(), &hex!("50 7a 32"));
    }

    #[test]
    fn test_hex() {
        let frame = Frame::from_hex("ef:82:11:42").unwrap();
        assert_eq!(frame.initiator, LogicalAddress::FreeUse);
        assert!(frame.is_broadcast());
        assert_eq!(frame.opcode, Opcode::ActiveSource);
        assert_eq!(frame.to_hex(), "EF:82:11:42");
    }

    #[test]
    fn test_poll_and_errors() {
        assert_eq!(Frame::from_hex("05"), Err(ParseError::MissingOpcode));
        assert_eq!(Frame::from_bytes(Vec::<u8>::new()), Err(ParseError::EmptyFrame));
        assert!(matches!(
            Frame::from_hex("05:zz"),
            Err(ParseError::InvalidHex(_))
        ));
        assert!(matches!(
            Frame::from_hex("05:123"),
            Err(ParseError::InvalidHex(_))
        ));
    }
}
