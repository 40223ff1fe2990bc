//! This crate bridges a request/response control surface to an HDMI-CEC bus.
//!
//! The bus is fire-and-forget: commands have no acknowledgment and state only becomes known
//! through later reports broadcast by devices. [`CecBridge`] keeps a consistent view of the bus
//! (device directory, audio status, power status, selected input) built purely from ingested
//! events, and drives a closed-loop volume controller on top of relative volume up/down presses.
//!
//! ```no_run
//! use anyhow::Result;
//! use cecbridge::{config::Config, CecBridge, MuteAction};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let bridge = CecBridge::open(Config::default()).await?;
//!     bridge.start().await?;
//!
//!     // Switch the TV over to HDMI input 11
//!     bridge.set_input(11).await?;
//!
//!     // Bring the amplifier to 40
//!     let outcome = bridge.set_volume(40).await?;
//!     println!("{:?}", outcome);
//!
//!     bridge.set_mute(MuteAction::Off).await?;
//!     bridge.stop().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub use cec_protocol::{
    AudioStatus, Command, Event, EventKind, Frame, LogicalAddress, PhysicalAddress, PowerStatus,
    UserControlCode,
};
use cec_protocol::Opcode;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
pub use transport::CecError;

pub type Result<T, E = CecError> = core::result::Result<T, E>;

pub mod client;
pub use client::{Client, DeviceTarget};
pub mod config;
pub mod discovery;
pub use discovery::Discovery;
pub mod ingest;
pub mod logging;
pub mod state;
pub use state::{LogicalDevice, StateStore};
pub mod transport;
pub mod utils;
pub mod volume;
pub use volume::{VolumeOutcome, VolumeTarget};

use config::Config;
use transport::{Multiplexer, Openable, Transport};

/// What to do with the audio system's mute state
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MuteAction {
    On,
    Off,
    Toggle,
}

/// High-level bus control API
pub struct CecBridge {
    client: Client,
    store: Arc<StateStore>,
    config: Arc<Config>,

    /// Serializes every operation consuming audio status reports. Reports carry no correlation
    /// id, so only one audio status query may be outstanding.
    audio_lock: tokio::sync::Mutex<()>,
}

impl CecBridge {
    /// Builds a bridge over an already opened transport, and starts ingesting its events
    pub fn new(transport: Transport, config: Config) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(StateStore::new());
        let mux = Multiplexer::new(transport, store.clone(), config.port_mapping.clone());
        let client = Client::new(mux, store.clone(), config.clone());

        CecBridge {
            client,
            store,
            config,
            audio_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Opens the transport described by the configuration
    pub async fn open(config: Config) -> Result<Self> {
        let transport = config.bus.open().await?;
        Ok(Self::new(transport, config))
    }

    /// Asks the display for its power status and the audio system for its volume so the
    /// snapshots get populated without waiting for a caller query
    pub async fn start(&self) -> Result<()> {
        log::info!("priming power and audio status");
        self.client
            .send(LogicalAddress::Tv, Command::GiveDevicePowerStatus)
            .await?;
        self.client
            .send(self.config.volume.audio_device(), Command::GiveAudioStatus)
            .await
    }

    /// Terminates the bus session. Must be called before exiting.
    pub async fn stop(&self) -> Result<()> {
        log::info!("stopping bus transport");
        self.client.multiplexer().stop().await
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Stream of every decoded event, after it has been applied to the state store
    pub fn subscribe(&self) -> Result<BroadcastStream<Event>> {
        Ok(BroadcastStream::new(self.client.multiplexer().subscribe()?))
    }

    /// Selects the given input port by announcing its physical address as the active source
    pub async fn set_input(&self, port: u8) -> Result<()> {
        self.client.set_active_source(port).await.map(|_| ())
    }

    /// Last known input port
    pub fn input(&self) -> Option<u8> {
        self.store.input()
    }

    /// Drives the audio system's volume towards `target` (0-100)
    pub async fn set_volume(&self, target: i64) -> Result<VolumeOutcome> {
        self.set_volume_target(VolumeTarget::new(target)?, CancellationToken::new())
            .await
    }

    /// Same as [`CecBridge::set_volume`] with an already validated target and a way to abort the
    /// controller at its next suspension point
    pub async fn set_volume_target(
        &self,
        target: VolumeTarget,
        cancel: CancellationToken,
    ) -> Result<VolumeOutcome> {
        let _guard = self.audio_lock.lock().await;
        volume::VolumeController::new(&self.client, &self.config.volume, cancel)
            .run(target)
            .await
    }

    /// Last known audio status
    pub fn volume(&self) -> Option<AudioStatus> {
        self.store.audio()
    }

    /// Queries the audio system and waits for its report
    pub async fn refresh_audio_status(&self) -> Result<AudioStatus> {
        let _guard = self.audio_lock.lock().await;
        self.client
            .query_audio_status(
                self.config.volume.audio_device(),
                self.config.volume.status_timeout(),
            )
            .await
    }

    pub async fn set_mute(&self, action: MuteAction) -> Result<()> {
        let _guard = self.audio_lock.lock().await;
        let audio_device = self.config.volume.audio_device();

        let press = match action {
            MuteAction::Toggle => true,
            action => {
                let status = self
                    .client
                    .query_audio_status(audio_device, self.config.volume.status_timeout())
                    .await?;
                (action == MuteAction::On) != status.muted
            }
        };

        if press {
            log::debug!("pressing mute ({})", action);
            self.client
                .press_key(audio_device, UserControlCode::Mute)
                .await?;
        }
        Ok(())
    }

    /// Turns a device on, or puts it in standby
    pub async fn set_power(&self, target: &DeviceTarget, on: bool) -> Result<()> {
        if on {
            self.client.power_on(target).await
        } else {
            self.client.standby(target).await
        }
    }

    /// Last known power status of a device
    pub fn power(&self, target: &DeviceTarget) -> Result<PowerStatus> {
        let address = self.client.resolve_target(target)?;
        Ok(self.store.power(address))
    }

    /// Queries a device for its power status and waits for its report
    pub async fn refresh_power(&self, target: &DeviceTarget) -> Result<PowerStatus> {
        let address = self.client.resolve_target(target)?;
        self.client
            .query(
                address,
                Command::GiveDevicePowerStatus,
                EventKind::PowerStatus,
                self.config.volume.status_timeout(),
            )
            .await?;
        Ok(self.store.power(address))
    }

    pub fn discovery(&self) -> Discovery {
        Discovery::new(self.client.clone(), self.store.clone())
    }

    /// Requests a topology scan, the directory fills in as devices report back
    pub async fn trigger_scan(&self) {
        self.discovery().scan().await
    }

    /// Snapshot of all 16 logical address slots
    pub fn devices(&self) -> Vec<LogicalDevice> {
        self.store.directory()
    }

    /// Sends `opcode[:params]` hex text to the audio system
    pub async fn send_raw_frame(&self, hex: &str) -> Result<()> {
        let command = Command::from_hex(hex)
            .map_err(|e| CecError::InvalidTarget(format!("raw command {:?}: {}", hex, e)))?;
        if let Command::Raw { opcode, .. } = &command {
            if matches!(opcode, Opcode::Unknown(_)) {
                log::warn!("sending unknown opcode {}", opcode);
            }
        }
        self.client
            .send(self.config.volume.audio_device(), command)
            .await
    }
}
