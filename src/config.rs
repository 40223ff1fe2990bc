//! Configuration file
//!
//! Every section is optional: missing values fall back to defaults matching a typical living room
//! setup (TV on logical address 0, amplifier on 5, switch ports 11-16 behind the amplifier).

use std::{collections::BTreeMap, fmt, path::Path, time::Duration};

use bimap::BiMap;
use cec_protocol::{LogicalAddress, PhysicalAddress};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logical address used as the initiator of every frame we send
    pub initiator: u8,

    pub bus: BusConfig,

    /// Input port number to physical address
    pub port_mapping: PortMapping,

    /// Device names usable as power targets (case-insensitive) to logical addresses
    pub devices: DeviceNames,

    pub volume: VolumeConfig,

    /// HTTP endpoint exposing the JSON API
    pub http_server: Option<HttpServer>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initiator: LogicalAddress::FreeUse.as_u8(),
            bus: BusConfig::default(),
            port_mapping: PortMapping::default(),
            devices: DeviceNames::default(),
            volume: VolumeConfig::default(),
            http_server: Some(HttpServer::default()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] confy::ConfyError),

    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    #[error("{field} must be a logical address between 0 and 15, got {value}")]
    InvalidAddress { field: &'static str, value: u8 },

    #[error("volume.press_divisor must be a positive number, got {0}")]
    InvalidPressDivisor(f32),
}

impl Config {
    /// Loads the configuration file, writing the defaults to it if it doesn't exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = confy::load_path(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would otherwise be truncated or make the volume controller misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("initiator", self.initiator),
            ("volume.audio_device", self.volume.audio_device),
        ] {
            if value > 0x0F {
                return Err(ConfigError::InvalidAddress { field, value });
            }
        }

        let divisor = self.volume.press_divisor;
        if !divisor.is_finite() || divisor <= 0.0 {
            return Err(ConfigError::InvalidPressDivisor(divisor));
        }
        Ok(())
    }

    pub fn initiator(&self) -> LogicalAddress {
        LogicalAddress::from_nibble(self.initiator)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Spawns libcec's `cec-client` and talks to it over stdio
    CecClient,

    /// Simulated bus with a TV and an amplifier
    Mock,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub backend: Backend,

    /// Path or name of the cec-client binary
    pub command: String,

    /// Arguments passed to cec-client before the optional port
    pub args: Vec<String>,

    /// Adapter port, if not auto-detected
    pub port: Option<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: Backend::CecClient,
            command: "cec-client".to_string(),
            args: ["-m", "-d", "8", "-t", "r"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            port: None,
        }
    }
}

/// Bidirectional mapping between input port numbers and physical addresses
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, PhysicalAddress>",
    into = "BTreeMap<String, PhysicalAddress>"
)]
pub struct PortMapping(BiMap<u8, PhysicalAddress>);

impl PortMapping {
    pub fn new() -> Self {
        Self(BiMap::new())
    }

    /// Adds a port, failing if either side is already mapped
    pub fn insert(&mut self, port: u8, address: PhysicalAddress) -> Result<(), PortMappingError> {
        self.0
            .insert_no_overwrite(port, address)
            .map_err(|(port, address)| PortMappingError::Duplicate { port, address })
    }

    pub fn address(&self, port: u8) -> Option<PhysicalAddress> {
        self.0.get_by_left(&port).copied()
    }

    pub fn port(&self, address: PhysicalAddress) -> Option<u8> {
        self.0.get_by_right(&address).copied()
    }

    /// Ports in ascending order
    pub fn ports(&self) -> Vec<u8> {
        let mut ports: Vec<u8> = self.0.left_values().copied().collect();
        ports.sort_unstable();
        ports
    }
}

impl Default for PortMapping {
    fn default() -> Self {
        let mut map = BiMap::new();
        for &(port, address) in &[
            (1, 0x1000),
            (2, 0x2000),
            (3, 0x3000),
            (11, 0x1142),
            (12, 0x1143),
            (13, 0x1110),
            (14, 0x1120),
            (15, 0x1130),
            (16, 0x1144),
        ] {
            map.insert(port, PhysicalAddress(address));
        }
        Self(map)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PortMappingError {
    #[error("port {port} or address {address} is mapped more than once")]
    Duplicate { port: u8, address: PhysicalAddress },

    #[error("invalid port number: {0:?}")]
    InvalidPort(String),
}

impl TryFrom<BTreeMap<String, PhysicalAddress>> for PortMapping {
    type Error = PortMappingError;

    fn try_from(value: BTreeMap<String, PhysicalAddress>) -> Result<Self, Self::Error> {
        let mut mapping = PortMapping::new();
        for (port, address) in value {
            let port = port
                .parse()
                .map_err(|_| PortMappingError::InvalidPort(port.clone()))?;
            mapping.insert(port, address)?;
        }
        Ok(mapping)
    }
}

impl From<PortMapping> for BTreeMap<String, PhysicalAddress> {
    fn from(mapping: PortMapping) -> Self {
        mapping
            .0
            .into_iter()
            .map(|(port, address)| (port.to_string(), address))
            .collect()
    }
}

/// Names usable to refer to devices, compared case-insensitively
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceNames(BTreeMap<String, u8>);

impl DeviceNames {
    pub fn lookup(&self, name: &str) -> Option<LogicalAddress> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, &v)| LogicalAddress::try_from(v).ok())
    }
}

impl Default for DeviceNames {
    fn default() -> Self {
        Self(
            [("TV", 0), ("AUDIOSYSTEM", 5), ("amplifier", 5)]
                .iter()
                .map(|&(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

/// Volume controller tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Logical address of the audio system receiving volume presses
    pub audio_device: u8,

    /// Maximum number of control loop iterations
    pub max_attempts: u32,

    /// The loop stops once the level is within this distance of the target
    pub loop_tolerance: u8,

    /// A single corrective press is issued if the final level is further than this from the target
    pub final_tolerance: u8,

    /// Distances above this are covered with a burst of presses
    pub far_threshold: u8,

    /// Typical number of volume units covered by a single press
    pub press_divisor: f32,

    pub near_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub status_timeout_ms: u64,

    /// Limits on waiting for reports to stop changing after a burst of presses
    pub debounce_max_polls: u32,
    pub debounce_deadline_ms: u64,
    pub debounce_interval_ms: u64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            audio_device: LogicalAddress::AudioSystem.as_u8(),
            max_attempts: 10,
            loop_tolerance: 1,
            final_tolerance: 2,
            far_threshold: 10,
            press_divisor: 2.5,
            near_delay_ms: 200,
            settle_delay_ms: 500,
            status_timeout_ms: 2000,
            debounce_max_polls: 8,
            debounce_deadline_ms: 5000,
            debounce_interval_ms: 100,
        }
    }
}

impl VolumeConfig {
    pub fn audio_device(&self) -> LogicalAddress {
        LogicalAddress::from_nibble(self.audio_device)
    }

    pub fn near_delay(&self) -> Duration {
        Duration::from_millis(self.near_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn debounce_deadline(&self) -> Duration {
        Duration::from_millis(self.debounce_deadline_ms)
    }

    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_interval_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpServer {
    /// Address used to bind the listening socket accepting HTTP connections
    pub bind_address: Option<String>,
}

impl Default for HttpServer {
    fn default() -> Self {
        Self {
            bind_address: Some("0.0.0.0:8080".to_string()),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::CecClient => f.write_str("cec-client"),
            Backend::Mock => f.write_str("mock"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.initiator(), LogicalAddress::FreeUse);
        assert_eq!(cfg.bus.backend, Backend::CecClient);
        assert_eq!(cfg.port_mapping.address(11), Some(PhysicalAddress(0x1142)));
        assert_eq!(cfg.port_mapping.port(PhysicalAddress(0x1130)), Some(15));
        assert_eq!(cfg.port_mapping.ports(), vec![1, 2, 3, 11, 12, 13, 14, 15, 16]);
        assert_eq!(cfg.devices.lookup("tv"), Some(LogicalAddress::Tv));
        assert_eq!(cfg.devices.lookup("Amplifier"), Some(LogicalAddress::AudioSystem));
        assert_eq!(cfg.volume, VolumeConfig::default());
    }

    #[test]
    fn test_parse() {
        let cfg = Config::from_toml(
            r#"
            initiator = 4

            [bus]
            backend = "mock"

            [port_mapping]
            1 = "1.0.0.0"
            4 = "0x4100"

            [devices]
            projector = 0

            [volume]
            max_attempts = 3
            near_delay_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(cfg.initiator(), LogicalAddress::PlaybackDevice1);
        assert_eq!(cfg.bus.backend, Backend::Mock);
        assert_eq!(cfg.bus.command, "cec-client");
        assert_eq!(cfg.port_mapping.ports(), vec![1, 4]);
        assert_eq!(cfg.port_mapping.address(4), Some(PhysicalAddress(0x4100)));
        assert_eq!(cfg.devices.lookup("PROJECTOR"), Some(LogicalAddress::Tv));
        assert_eq!(cfg.devices.lookup("tv"), None);
        assert_eq!(cfg.volume.max_attempts, 3);
        assert_eq!(cfg.volume.near_delay(), Duration::from_millis(10));
        assert_eq!(cfg.volume.final_tolerance, 2);
    }

    #[test]
    fn test_duplicate_ports() {
        let err = Config::from_toml(
            r#"
            [port_mapping]
            1 = "1.0.0.0"
            2 = "1.0.0.0"
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_toml("initiator = 16"),
            Err(ConfigError::InvalidAddress {
                field: "initiator",
                value: 16
            })
        ));
        assert!(matches!(
            Config::from_toml("[volume]\naudio_device = 21"),
            Err(ConfigError::InvalidAddress {
                field: "volume.audio_device",
                ..
            })
        ));
        for divisor in ["0.0", "-2.5"] {
            let toml = format!("[volume]\npress_divisor = {}", divisor);
            assert!(
                matches!(
                    Config::from_toml(&toml),
                    Err(ConfigError::InvalidPressDivisor(_))
                ),
                "{}",
                divisor
            );
        }
        assert!(Config::from_toml("initiator = 15").is_ok());
    }

    #[test]
    fn test_roundtrip() {
        let cfg = Config::default();
        let s = toml::to_string(&cfg).unwrap();
        let parsed = Config::from_toml(&s).unwrap();
        assert_eq!(parsed.port_mapping, cfg.port_mapping);
        assert_eq!(parsed.volume, cfg.volume);
    }

    #[test]
    fn test_example_file() {
        let cfg = Config::from_toml(include_str!("../docs/config.example.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(cfg.port_mapping, defaults.port_mapping);
        assert_eq!(cfg.devices, defaults.devices);
        assert_eq!(cfg.volume, defaults.volume);
    }
}
