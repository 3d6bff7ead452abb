//! Event ingestion — link notifications and clock samples.
//!
//! Two event shapes feed the state table:
//! - push events from the WiFi driver, delivered on the system event task
//!   at arbitrary times relative to the tick;
//! - clock samples, taken by the tick while TimeSync is activating.
//!
//! ```text
//! ┌──────────────────┐
//! │ WiFi/IP event    │──┐   ┌──────────────┐     ┌──────────────┐
//! │ (event task)     │  ├──▶│ EventIngress │────▶│ ServiceTable │
//! │ Clock sample     │──┘   │ (state+pulse)│     │  (atomics)   │
//! │ (tick)           │      └──────────────┘     └──────┬───────┘
//! └──────────────────┘                                  │ pulses
//!                                                       ▼
//!                                               Cascade scheduler
//! ```
//!
//! Ingestion only writes state and pulse bits; it never calls a
//! collaborator.  All follow-up work happens on the next tick.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::catalog::ServiceKind;
use crate::fsm::{ServiceEvent, ServiceState, ServiceTable};

/// Notifications emitted by the link driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Associated with the access point; no address yet.
    StationConnected,
    /// Association lost.
    StationDisconnected,
    /// DHCP assigned an address; the link is usable.
    GotAddress,
}

/// Cloneable handle through which platform callbacks reach one
/// orchestrator instance.
///
/// Safe to move into `'static + Send` event-loop closures.
#[derive(Clone)]
pub struct EventIngress {
    table: Arc<ServiceTable>,
}

impl EventIngress {
    pub(crate) fn new(table: Arc<ServiceTable>) -> Self {
        Self { table }
    }

    pub fn dispatch(&self, event: LinkEvent) {
        match event {
            LinkEvent::StationConnected => self.on_link_connected(),
            LinkEvent::StationDisconnected => self.on_link_disconnected(),
            LinkEvent::GotAddress => self.on_link_got_address(),
        }
    }

    /// Association alone does not make the link usable.
    pub fn on_link_connected(&self) {
        info!("Link: associated, waiting for address");
    }

    pub fn on_link_disconnected(&self) {
        warn!("Link: station disconnected");
        self.table.apply(ServiceKind::Link, ServiceEvent::Lost);
        self.table.mark_root_lost();
    }

    pub fn on_link_got_address(&self) {
        info!("Link: address acquired");
        self.table.apply(ServiceKind::Link, ServiceEvent::AddressAcquired);
    }

    /// Feed one wall-clock sample.  TimeSync converges once `now` exceeds
    /// `threshold`; samples at or below it mean SNTP has not landed yet.
    ///
    /// Returns `true` if this sample completed the sync.
    pub fn clock_sample(&self, now: i64, threshold: i64) -> bool {
        if self.table.state(ServiceKind::TimeSync) != ServiceState::Activating {
            return false;
        }
        if now <= threshold {
            debug!("TimeSync: clock at {now}s, still unsynchronised");
            return false;
        }
        info!("TimeSync: clock synchronised ({now}s since epoch)");
        self.table
            .apply(ServiceKind::TimeSync, ServiceEvent::Succeeded)
            .is_some()
    }
}
