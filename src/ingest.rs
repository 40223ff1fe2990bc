//! Applies decoded events to the state store
//!
//! This is the only code path allowed to mutate [`StateStore`].

use cec_protocol::Event;

use crate::{config::PortMapping, state::StateStore};

/// Updates the store according to `event`. Returns whether anything was recorded.
pub fn apply(store: &StateStore, mapping: &PortMapping, event: &Event) -> bool {
    match event {
        Event::ReportPowerStatus { source, status } => match status {
            Some(status) => {
                log::debug!("power status of {}: {}", source, status);
                store.set_power(*source, *status);
                true
            }
            None => {
                log::trace!("{} is changing power state", source);
                false
            }
        },
        Event::ReportAudioStatus { status, .. } => {
            log::debug!("audio status: level={} muted={}", status.level, status.muted);
            store.set_audio(*status);
            true
        }
        Event::RoutingChange { to: address, .. } => match mapping.port(*address) {
            Some(port) => {
                log::debug!("input is now {} ({})", port, address);
                store.set_input(port);
                true
            }
            None => {
                log::debug!("{} isn't a mapped input", address);
                false
            }
        },
        // Only the switch reports which input is actually shown
        Event::ActiveSource { source, address } => {
            log::trace!("{} claims to be the active source ({})", source, address);
            false
        }
        Event::SetOsdName { source, name } => {
            store.set_name(*source, name.clone());
            true
        }
        Event::ReportPhysicalAddress {
            source, address, ..
        } => {
            store.set_physical_address(*source, *address);
            true
        }
        Event::Other(_) => false,
    }
}

/// Records an input we selected ourselves, the adapter doesn't echo our own announcements
pub fn select_input(store: &StateStore, port: u8) {
    log::debug!("input is now {} (selected locally)", port);
    store.set_input(port);
}
