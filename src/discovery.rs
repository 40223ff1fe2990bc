//! Populates the device directory
//!
//! Discovery never fails outright: devices that don't answer simply stay unknown in the
//! directory, and transport errors are logged.

use std::{sync::Arc, time::Duration};

use cec_protocol::{Command, LogicalAddress};
use tokio::time::Instant;

use crate::{
    client::Client,
    state::{LogicalDevice, StateStore},
};

#[derive(Clone)]
pub struct Discovery {
    client: Client,
    store: Arc<StateStore>,
}

impl Discovery {
    pub fn new(client: Client, store: Arc<StateStore>) -> Self {
        Self { client, store }
    }

    /// Asks the adapter to poll every logical address. Devices that are present report their
    /// physical address and name, which are picked up by event ingestion.
    pub async fn scan(&self) {
        log::info!("scanning bus topology");
        if let Err(e) = self.client.send_raw("scan").await {
            log::warn!("couldn't request a bus scan: {}", e);
        }
    }

    /// Asks a single device for its name and physical address
    pub async fn probe(&self, address: LogicalAddress) {
        for command in [Command::GivePhysicalAddress, Command::GiveOsdName] {
            if let Err(e) = self.client.send(address, command).await {
                log::warn!("couldn't probe {}: {}", address, e);
                return;
            }
        }
    }

    /// Current directory, one entry per logical address
    pub fn directory(&self) -> Vec<LogicalDevice> {
        self.store.directory()
    }

    fn known(&self) -> usize {
        self.store
            .directory()
            .iter()
            .filter(|d| d.physical_address.is_some() || d.name.is_some())
            .count()
    }

    /// Waits until the directory stops changing for `interval`, or `deadline` has elapsed, then
    /// returns it
    pub async fn settle(&self, interval: Duration, deadline: Duration) -> Vec<LogicalDevice> {
        let deadline = Instant::now() + deadline;
        let mut last = self.store.directory();

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;

            let current = self.store.directory();
            if current == last {
                break;
            }
            last = current;
        }

        log::debug!("directory settled with {} known device(s)", self.known());
        last
    }
}
