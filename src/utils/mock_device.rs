//! Provides a simulated bus for testing purposes
//!
//! The bus holds a TV, an amplifier and whatever devices are added to it. The amplifier moves its
//! level by `step_size` for each volume press, but can be configured to only apply part of the
//! pending presses at each report, the way real amplifiers report stale levels during a burst.

use std::{collections::VecDeque, time::Duration};

use cec_protocol::{
    AudioStatus, Command, Event, Frame, LogicalAddress, PhysicalAddress, PowerStatus,
    UserControlCode,
};

use crate::transport::BusRequest;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockDevice {
    pub address: LogicalAddress,
    pub physical_address: PhysicalAddress,
    pub name: String,
    pub power: PowerStatus,
}

impl MockDevice {
    pub fn new(address: LogicalAddress, physical_address: u16, name: &str) -> Self {
        Self {
            address,
            physical_address: PhysicalAddress(physical_address),
            name: name.to_string(),
            power: PowerStatus::On,
        }
    }
}

pub struct MockBus {
    pub devices: Vec<MockDevice>,

    pub level: u8,
    pub muted: bool,

    /// Volume units moved by a single press
    pub step_size: u8,

    /// Maximum number of pending presses applied before each audio status report, `None` applies
    /// everything right away
    pub steps_per_report: Option<usize>,

    /// Stop answering audio status queries
    pub audio_silent: bool,

    /// Every frame received, in order
    pub received: Vec<Frame>,

    /// Delay before each response
    pub response_delay: Option<Duration>,

    pending_steps: VecDeque<bool>,
}

impl Default for MockBus {
    fn default() -> Self {
        Self {
            devices: vec![
                MockDevice::new(LogicalAddress::Tv, 0x0000, "TV"),
                MockDevice::new(LogicalAddress::AudioSystem, 0x1000, "Amplifier"),
            ],
            level: 50,
            muted: false,
            step_size: 2,
            steps_per_report: None,
            audio_silent: false,
            received: Vec::new(),
            response_delay: None,
            pending_steps: VecDeque::new(),
        }
    }
}

impl MockBus {
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn with_step_size(mut self, step_size: u8) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_steps_per_report(mut self, steps: usize) -> Self {
        self.steps_per_report = Some(steps);
        self
    }

    pub fn with_silent_audio(mut self) -> Self {
        self.audio_silent = true;
        self
    }

    pub fn with_device(mut self, device: MockDevice) -> Self {
        self.devices.push(device);
        self
    }

    pub fn device(&self, address: LogicalAddress) -> Option<&MockDevice> {
        self.devices.iter().find(|d| d.address == address)
    }

    fn device_mut(&mut self, address: LogicalAddress) -> Option<&mut MockDevice> {
        self.devices.iter_mut().find(|d| d.address == address)
    }

    /// Frames received that match the given command
    pub fn count(&self, command: &Command) -> usize {
        self.received
            .iter()
            .filter(|f| &Command::from_frame(f) == command)
            .count()
    }

    pub fn volume_presses(&self) -> (usize, usize) {
        (
            self.count(&Command::UserControlPressed(UserControlCode::VolumeUp)),
            self.count(&Command::UserControlPressed(UserControlCode::VolumeDown)),
        )
    }

    pub fn audio_status(&self) -> AudioStatus {
        AudioStatus::new(self.level, self.muted)
    }

    fn apply_steps(&mut self) {
        let count = self
            .steps_per_report
            .unwrap_or(usize::MAX)
            .min(self.pending_steps.len());
        for up in self.pending_steps.drain(..count) {
            self.level = if up {
                self.level.saturating_add(self.step_size).min(100)
            } else {
                self.level.saturating_sub(self.step_size)
            };
        }
    }

    /// Reacts to a request, returning the frames devices send back
    pub fn execute(&mut self, request: &BusRequest) -> Vec<Frame> {
        let frame = match request {
            BusRequest::Frame(frame) => frame,
            BusRequest::Raw(line) if line == "scan" => {
                return self
                    .devices
                    .iter()
                    .flat_map(|d| {
                        [
                            Event::ReportPhysicalAddress {
                                source: d.address,
                                address: d.physical_address,
                                device_type: 0,
                            }
                            .to_frame(LogicalAddress::Broadcast),
                            Event::SetOsdName {
                                source: d.address,
                                name: d.name.clone(),
                            }
                            .to_frame(LogicalAddress::Broadcast),
                        ]
                    })
                    .collect();
            }
            BusRequest::Raw(_) => return vec![],
        };

        self.received.push(frame.clone());
        let initiator = frame.initiator;
        let destination = frame.destination;

        let targets: Vec<LogicalAddress> = if frame.is_broadcast() {
            self.devices.iter().map(|d| d.address).collect()
        } else if self.device(destination).is_some() {
            vec![destination]
        } else {
            return vec![];
        };

        let mut responses = Vec::new();
        for target in targets {
            if let Some(response) = self.execute_one(target, Command::from_frame(frame)) {
                responses.push(response.to_frame(initiator));
            }
        }
        responses
    }

    fn execute_one(&mut self, target: LogicalAddress, command: Command) -> Option<Event> {
        match command {
            Command::GiveDevicePowerStatus => Some(Event::ReportPowerStatus {
                source: target,
                status: Some(self.device(target)?.power),
            }),
            Command::GiveAudioStatus if target == LogicalAddress::AudioSystem => {
                if self.audio_silent {
                    return None;
                }
                self.apply_steps();
                Some(Event::ReportAudioStatus {
                    source: target,
                    status: self.audio_status(),
                })
            }
            Command::GiveOsdName => Some(Event::SetOsdName {
                source: target,
                name: self.device(target)?.name.clone(),
            }),
            Command::GivePhysicalAddress => {
                let device = self.device(target)?;
                Some(Event::ReportPhysicalAddress {
                    source: target,
                    address: device.physical_address,
                    device_type: 0,
                })
            }
            Command::Standby => {
                self.device_mut(target)?.power = PowerStatus::Standby;
                None
            }
            Command::ImageViewOn if target == LogicalAddress::Tv => {
                self.device_mut(target)?.power = PowerStatus::On;
                None
            }
            Command::UserControlPressed(code) => {
                match code {
                    UserControlCode::VolumeUp if target == LogicalAddress::AudioSystem => {
                        self.pending_steps.push_back(true)
                    }
                    UserControlCode::VolumeDown if target == LogicalAddress::AudioSystem => {
                        self.pending_steps.push_back(false)
                    }
                    UserControlCode::Mute if target == LogicalAddress::AudioSystem => {
                        self.muted = !self.muted
                    }
                    UserControlCode::PowerOn => self.device_mut(target)?.power = PowerStatus::On,
                    _ => {}
                }
                None
            }
            _ => None,
        }
    }
}
