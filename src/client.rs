//! Translates intents into frames sent on the bus

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use cec_protocol::{
    AudioStatus, Command, Event, EventKind, LogicalAddress, PhysicalAddress, UserControlCode,
};

use crate::{
    config::Config,
    ingest,
    state::StateStore,
    transport::{BusRequest, CecError, Multiplexer},
    utils::ErrInto,
    Result,
};

/// A way of designating a device when controlling its power
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceTarget {
    /// Name from the configuration's `[devices]` section, such as `TV`
    Named(String),

    /// Logical address, `0`-`15`
    Logical(LogicalAddress),

    /// Physical address announced by a device, `1.1.0.0`, `0x1100` or `1100`
    Physical(PhysicalAddress),

    /// Mapped input port, `input:11`
    Port(u8),
}

impl FromStr for DeviceTarget {
    type Err = CecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CecError::invalid_target("empty device name"));
        }

        if let Some(port) = s.strip_prefix("input:") {
            return port
                .parse()
                .map(DeviceTarget::Port)
                .map_err(|_| CecError::invalid_target(format!("invalid input port {:?}", port)));
        }

        // Four bare hex digits are a physical address, shorter numbers a logical one
        let bare_physical = s.len() == 4 && s.bytes().all(|b| b.is_ascii_hexdigit());
        if s.contains('.') || s.starts_with("0x") || bare_physical {
            return s
                .parse()
                .map(DeviceTarget::Physical)
                .map_err(|e| CecError::invalid_target(e));
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<u8>()
                .ok()
                .and_then(|n| LogicalAddress::try_from(n).ok())
                .map(DeviceTarget::Logical)
                .ok_or_else(|| {
                    CecError::invalid_target(format!("logical address out of range: {}", s))
                });
        }

        Ok(DeviceTarget::Named(s.to_string()))
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceTarget::Named(name) => f.write_str(name),
            DeviceTarget::Logical(addr) => write!(f, "{}", addr.as_u8()),
            DeviceTarget::Physical(addr) => write!(f, "{}", addr),
            DeviceTarget::Port(port) => write!(f, "input:{}", port),
        }
    }
}

/// Sends commands to the bus on behalf of a single initiator
#[derive(Clone)]
pub struct Client {
    mux: Arc<Multiplexer>,
    store: Arc<StateStore>,
    config: Arc<Config>,
}

impl Client {
    pub fn new(mux: Arc<Multiplexer>, store: Arc<StateStore>, config: Arc<Config>) -> Self {
        Self { mux, store, config }
    }

    pub fn multiplexer(&self) -> &Arc<Multiplexer> {
        &self.mux
    }

    pub fn initiator(&self) -> LogicalAddress {
        self.config.initiator()
    }

    /// Sends a single command to `destination`
    pub async fn send(&self, destination: LogicalAddress, command: Command) -> Result<()> {
        let frame = command.to_frame(self.initiator(), destination);
        self.mux.send(BusRequest::Frame(frame)).await
    }

    /// Sends an adapter-level command, such as `scan`
    pub async fn send_raw(&self, line: &str) -> Result<()> {
        self.mux.send(BusRequest::Raw(line.to_string())).await
    }

    /// Sends `command` and waits for the next `kind` report coming from `destination`
    pub async fn query(
        &self,
        destination: LogicalAddress,
        command: Command,
        kind: EventKind,
        timeout: Duration,
    ) -> Result<Event> {
        let pending = self.mux.wait_for(kind, Some(destination));
        self.send(destination, command).await?;
        pending.timeout(timeout).await
    }

    pub async fn query_audio_status(
        &self,
        destination: LogicalAddress,
        timeout: Duration,
    ) -> Result<AudioStatus> {
        match self
            .query(
                destination,
                Command::GiveAudioStatus,
                EventKind::AudioStatus,
                timeout,
            )
            .await?
        {
            Event::ReportAudioStatus { status, .. } => Ok(status),
            other => Err(anyhow::anyhow!("unexpected event: {:?}", other)).err_into(),
        }
    }

    /// Presses and releases a remote control button
    pub async fn press_key(&self, destination: LogicalAddress, code: UserControlCode) -> Result<()> {
        self.press_key_repeated(destination, code, 1).await
    }

    /// Presses and releases a button `count` times, without other frames interleaving
    pub async fn press_key_repeated(
        &self,
        destination: LogicalAddress,
        code: UserControlCode,
        count: u32,
    ) -> Result<()> {
        let initiator = self.initiator();
        let press = Command::UserControlPressed(code).to_frame(initiator, destination);
        let release = Command::UserControlRelease.to_frame(initiator, destination);

        let mut sender = self.mux.send_lock().await;
        for _ in 0..count {
            sender.send(BusRequest::Frame(press.clone())).await?;
            sender.send(BusRequest::Frame(release.clone())).await?;
        }
        Ok(())
    }

    pub fn resolve_port(&self, port: u8) -> Result<PhysicalAddress> {
        self.config
            .port_mapping
            .address(port)
            .ok_or_else(|| CecError::invalid_target(format!("unknown input port {}", port)))
    }

    /// Announces the physical address of `port` as the active source.
    ///
    /// The adapter doesn't echo our own frames, so the selection is recorded locally.
    pub async fn set_active_source(&self, port: u8) -> Result<PhysicalAddress> {
        let address = self.resolve_port(port)?;
        log::info!("selecting input {} ({})", port, address);
        self.send(LogicalAddress::Broadcast, Command::ActiveSource(address))
            .await?;
        ingest::select_input(&self.store, port);
        Ok(address)
    }

    pub fn resolve_target(&self, target: &DeviceTarget) -> Result<LogicalAddress> {
        let unknown = || CecError::invalid_target(format!("unknown device {}", target));
        match target {
            DeviceTarget::Named(name) => self.config.devices.lookup(name).ok_or_else(unknown),
            DeviceTarget::Logical(address) => Ok(*address),
            DeviceTarget::Physical(address) => {
                self.store.find_physical(*address).ok_or_else(unknown)
            }
            DeviceTarget::Port(port) => {
                let address = self.resolve_port(*port)?;
                self.store.find_physical(address).ok_or_else(unknown)
            }
        }
    }

    /// Turns on a device. The display wakes up with Image View On, other devices get a power on
    /// button press.
    pub async fn power_on(&self, target: &DeviceTarget) -> Result<()> {
        let address = self.resolve_target(target)?;
        log::info!("powering on {} ({})", target, address);
        if address == LogicalAddress::Tv {
            self.send(address, Command::ImageViewOn).await
        } else {
            self.press_key(address, UserControlCode::PowerOn).await
        }
    }

    pub async fn standby(&self, target: &DeviceTarget) -> Result<()> {
        let address = self.resolve_target(target)?;
        log::info!("putting {} ({}) in standby", target, address);
        self.send(address, Command::Standby).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(
            "TV".parse::<DeviceTarget>().unwrap(),
            DeviceTarget::Named("TV".to_string())
        );
        assert_eq!(
            "5".parse::<DeviceTarget>().unwrap(),
            DeviceTarget::Logical(LogicalAddress::AudioSystem)
        );
        assert_eq!(
            "1.1.0.0".parse::<DeviceTarget>().unwrap(),
            DeviceTarget::Physical(PhysicalAddress(0x1100))
        );
        assert_eq!(
            "0x1142".parse::<DeviceTarget>().unwrap(),
            DeviceTarget::Physical(PhysicalAddress(0x1142))
        );
        assert_eq!(
            "1142".parse::<DeviceTarget>().unwrap(),
            DeviceTarget::Physical(PhysicalAddress(0x1142))
        );
        assert_eq!(
            "015".parse::<DeviceTarget>().unwrap(),
            DeviceTarget::Logical(LogicalAddress::Broadcast)
        );
        assert_eq!(
            "input:11".parse::<DeviceTarget>().unwrap(),
            DeviceTarget::Port(11)
        );

        assert!(matches!(
            "16".parse::<DeviceTarget>(),
            Err(CecError::InvalidTarget(_))
        ));
        assert!(matches!(
            "input:x".parse::<DeviceTarget>(),
            Err(CecError::InvalidTarget(_))
        ));
        assert!(matches!(
            "1.1".parse::<DeviceTarget>(),
            Err(CecError::InvalidTarget(_))
        ));
        assert!("".parse::<DeviceTarget>().is_err());
    }
}
