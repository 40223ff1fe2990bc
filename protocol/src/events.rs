//! Reports and announcements received from devices

use bytes::{Buf, Bytes};

use crate::{
    address::{LogicalAddress, PhysicalAddress},
    frame::{Frame, ParseError},
    opcode::Opcode,
    AudioStatus, PowerStatus,
};

/// Categories of events, used to wait for the next occurrence of a given report
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum EventKind {
    PowerStatus,
    AudioStatus,
    RoutingChange,
    ActiveSource,
    OsdName,
    PhysicalAddress,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// 0x90: `status` is `None` while the device is transitioning between states
    ReportPowerStatus {
        source: LogicalAddress,
        status: Option<PowerStatus>,
    },

    /// 0x7A
    ReportAudioStatus {
        source: LogicalAddress,
        status: AudioStatus,
    },

    /// 0x80
    RoutingChange {
        source: LogicalAddress,
        from: PhysicalAddress,
        to: PhysicalAddress,
    },

    /// 0x82
    ActiveSource {
        source: LogicalAddress,
        address: PhysicalAddress,
    },

    /// 0x47
    SetOsdName {
        source: LogicalAddress,
        name: String,
    },

    /// 0x84
    ReportPhysicalAddress {
        source: LogicalAddress,
        address: PhysicalAddress,
        device_type: u8,
    },

    /// Anything else seen on the bus
    Other(Frame),
}

impl Event {
    /// Decodes a received frame
    pub fn from_frame(frame: Frame) -> Result<Self, ParseError> {
        let source = frame.initiator;
        let opcode = frame.opcode;
        let mut params: Bytes = frame.params.clone();
        let short = |expected: usize, actual: usize| ParseError::UnexpectedLength {
            opcode,
            expected,
            actual,
        };
        let len = params.len();

        Ok(match opcode {
            Opcode::ReportPowerStatus => {
                let b = params.try_get_u8().map_err(|_| short(1, len))?;
                Event::ReportPowerStatus {
                    source,
                    status: PowerStatus::from_byte(b),
                }
            }
            Opcode::ReportAudioStatus => {
                let b = params.try_get_u8().map_err(|_| short(1, len))?;
                Event::ReportAudioStatus {
                    source,
                    status: AudioStatus::from_byte(b),
                }
            }
            Opcode::RoutingChange => {
                let from = params.try_get_u16().map_err(|_| short(4, len))?;
                let to = params.try_get_u16().map_err(|_| short(4, len))?;
                Event::RoutingChange {
                    source,
                    from: PhysicalAddress(from),
                    to: PhysicalAddress(to),
                }
            }
            Opcode::ActiveSource => {
                let address = params.try_get_u16().map_err(|_| short(2, len))?;
                Event::ActiveSource {
                    source,
                    address: PhysicalAddress(address),
                }
            }
            Opcode::SetOsdName => {
                if params.is_empty() {
                    return Err(short(1, 0));
                }
                Event::SetOsdName {
                    source,
                    name: String::from_utf8_lossy(&params).trim().to_string(),
                }
            }
            Opcode::ReportPhysicalAddress => {
                let address = params.try_get_u16().map_err(|_| short(3, len))?;
                // Some devices omit the device type
                let device_type = params.try_get_u8().unwrap_or(0xFF);
                Event::ReportPhysicalAddress {
                    source,
                    address: PhysicalAddress(address),
                    device_type,
                }
            }
            _ => Event::Other(frame),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::ReportPowerStatus { .. } => EventKind::PowerStatus,
            Event::ReportAudioStatus { .. } => EventKind::AudioStatus,
            Event::RoutingChange { .. } => EventKind::RoutingChange,
            Event::ActiveSource { .. } => EventKind::ActiveSource,
            Event::SetOsdName { .. } => EventKind::OsdName,
            Event::ReportPhysicalAddress { .. } => EventKind::PhysicalAddress,
            Event::Other(_) => EventKind::Other,
        }
    }

    pub fn source(&self) -> LogicalAddress {
        match self {
            Event::ReportPowerStatus { source, .. }
            | Event::ReportAudioStatus { source, .. }
            | Event::RoutingChange { source, .. }
            | Event::ActiveSource { source, .. }
            | Event::SetOsdName { source, .. }
            | Event::ReportPhysicalAddress { source, .. } => *source,
            Event::Other(frame) => frame.initiator,
        }
    }

    /// Re-encodes the event as the frame a device would send to announce it
    pub fn to_frame(&self, destination: LogicalAddress) -> Frame {
        let source = self.source();
        match self {
            Event::ReportPowerStatus { status, .. } => {
                let b = match status {
                    Some(PowerStatus::On) => 0x00,
                    Some(PowerStatus::Standby) | Some(PowerStatus::Unknown) => 0x01,
                    None => 0x02,
                };
                Frame::new(source, destination, Opcode::ReportPowerStatus, vec![b])
            }
            Event::ReportAudioStatus { status, .. } => Frame::new(
                source,
                destination,
                Opcode::ReportAudioStatus,
                vec![status.to_byte()],
            ),
            Event::RoutingChange { from, to, .. } => {
                let mut params = from.to_bytes().to_vec();
                params.extend_from_slice(&to.to_bytes());
                Frame::new(source, destination, Opcode::RoutingChange, params)
            }
            Event::ActiveSource { address, .. } => Frame::new(
                source,
                destination,
                Opcode::ActiveSource,
                address.to_bytes().to_vec(),
            ),
            Event::SetOsdName { name, .. } => Frame::new(
                source,
                destination,
                Opcode::SetOsdName,
                name.as_bytes().to_vec(),
            ),
            Event::ReportPhysicalAddress {
                address,
                device_type,
                ..
            } => {
                let mut params = address.to_bytes().to_vec();
                params.push(*device_type);
                Frame::new(source, destination, Opcode::ReportPhysicalAddress, params)
            }
            Event::Other(frame) => frame.clone(),
        }
    }
}
