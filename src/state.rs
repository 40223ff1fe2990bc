//! Authoritative snapshot of what is known about the bus
//!
//! The store only changes as a result of ingested events, see [`crate::ingest`]. Everything else
//! reads copies.

use std::sync::RwLock;

use cec_protocol::{AudioStatus, LogicalAddress, PhysicalAddress, PowerStatus};
use serde::Serialize;

/// Directory entry for one logical address slot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogicalDevice {
    pub logical_address: u8,
    pub name: Option<String>,
    pub physical_address: Option<PhysicalAddress>,
    pub power: PowerStatus,
}

impl LogicalDevice {
    fn empty(address: LogicalAddress) -> Self {
        Self {
            logical_address: address.as_u8(),
            name: None,
            physical_address: None,
            power: PowerStatus::Unknown,
        }
    }
}

#[derive(Clone, Debug, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Always holds one entry per logical address, indexed by address
    pub devices: Vec<LogicalDevice>,
    pub audio: Option<AudioStatus>,
    pub current_input: Option<u8>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            devices: LogicalAddress::all().map(LogicalDevice::empty).collect(),
            audio: None,
            current_input: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct StateStore {
    inner: RwLock<State>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        // A poisoned lock still holds a coherent state since writers never panic halfway
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn snapshot(&self) -> State {
        self.read(Clone::clone)
    }

    pub fn audio(&self) -> Option<AudioStatus> {
        self.read(|s| s.audio)
    }

    pub fn power(&self, address: LogicalAddress) -> PowerStatus {
        self.read(|s| s.devices[address.index()].power)
    }

    pub fn input(&self) -> Option<u8> {
        self.read(|s| s.current_input)
    }

    /// Copy of all 16 directory slots
    pub fn directory(&self) -> Vec<LogicalDevice> {
        self.read(|s| s.devices.clone())
    }

    pub fn device(&self, address: LogicalAddress) -> LogicalDevice {
        self.read(|s| s.devices[address.index()].clone())
    }

    /// Logical address of the device announcing the given physical address, if any
    pub fn find_physical(&self, address: PhysicalAddress) -> Option<LogicalAddress> {
        self.read(|s| {
            s.devices
                .iter()
                .find(|d| d.physical_address == Some(address))
                .map(|d| LogicalAddress::from_nibble(d.logical_address))
        })
    }

    pub(crate) fn set_audio(&self, status: AudioStatus) {
        self.write(|s| s.audio = Some(status))
    }

    pub(crate) fn set_power(&self, address: LogicalAddress, power: PowerStatus) {
        self.write(|s| s.devices[address.index()].power = power)
    }

    pub(crate) fn set_input(&self, port: u8) {
        self.write(|s| s.current_input = Some(port))
    }

    pub(crate) fn set_name(&self, address: LogicalAddress, name: String) {
        self.write(|s| s.devices[address.index()].name = Some(name))
    }

    pub(crate) fn set_physical_address(&self, address: LogicalAddress, physical: PhysicalAddress) {
        self.write(|s| s.devices[address.index()].physical_address = Some(physical))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_initial_state() {
        let store = StateStore::new();
        let directory = store.directory();
        assert_eq!(directory.len(), LogicalAddress::COUNT);
        for (i, device) in directory.iter().enumerate() {
            assert_eq!(device.logical_address as usize, i);
            assert_eq!(device.name, None);
            assert_eq!(device.physical_address, None);
        }
        assert_eq!(store.audio(), None);
        assert_eq!(store.input(), None);
        assert_eq!(store.power(LogicalAddress::Tv), PowerStatus::Unknown);
    }

    #[test]
    fn test_updates() {
        let store = StateStore::new();
        store.set_physical_address(LogicalAddress::PlaybackDevice1, PhysicalAddress(0x1100));
        store.set_name(LogicalAddress::PlaybackDevice1, "SHIELD".to_string());
        store.set_power(LogicalAddress::Tv, PowerStatus::On);

        assert_eq!(
            store.find_physical(PhysicalAddress(0x1100)),
            Some(LogicalAddress::PlaybackDevice1)
        );
        assert_eq!(store.find_physical(PhysicalAddress(0x2000)), None);
        assert_eq!(
            store.device(LogicalAddress::PlaybackDevice1).name.as_deref(),
            Some("SHIELD")
        );
        assert_eq!(store.power(LogicalAddress::Tv), PowerStatus::On);

        let json = serde_json::to_value(store.device(LogicalAddress::PlaybackDevice1)).unwrap();
        assert_eq!(json["physicalAddress"], "1.1.0.0");
        assert_eq!(json["logicalAddress"], 4);
    }
}
