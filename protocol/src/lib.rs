//! HDMI-CEC protocol implementation.
//!
//! This crate provides the basic components needed to talk to devices on a CEC bus: logical and
//! physical addressing, opcodes, frame parsing and formatting, command builders and decoding of
//! the reports devices broadcast back.
//!
//! It doesn't include any transport implementations.


pub mod address;
pub use address::{LogicalAddress, PhysicalAddress};

pub mod opcode;
pub use opcode::{Opcode, UserControlCode};

pub mod frame;
pub use frame::{Frame, ParseError};

pub mod commands;
pub use commands::Command;

pub mod events;
pub use events::{Event, EventKind};

pub mod audio;
pub use audio::AudioStatus;

pub mod power;
pub use power::PowerStatus;
