//! Cascade scheduler.
//!
//! One pass per tick, never blocking.  The scheduler consumes pulses in a
//! fixed order and activates every service whose prerequisites have just
//! become available.  It knows nothing about WiFi, TLS or MQTT: bringing a
//! service up is delegated to an [`Activator`], which the orchestrator
//! implements over its collaborators.
//!
//! ```text
//!   pulse order:  Link ──▶ TimeSync ──▶ SecureTransport ──▶ PubSub ──▶ Messaging
//!                  │           │               │
//!                  ▼           ▼               ▼
//!             TimeSync,   SecureTransport   Messaging
//!             PubSub, ...
//! ```
//!
//! A pulse raised by an activation earlier in the pass is consumed later
//! in the same pass, so a chain of synchronous activations can complete in
//! one tick.  Services that finish asynchronously (TimeSync) continue on a
//! later tick.

use log::{debug, warn};

use crate::catalog::{ServiceKind, ServiceSet};
use crate::fsm::{ServiceEvent, ServiceState, ServiceTable};

// ═══════════════════════════════════════════════════════════════
//  Activation seam
// ═══════════════════════════════════════════════════════════════

/// Outcome of asking a collaborator to bring a service up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Up now; the service goes `Active` with a pulse.
    Ready,
    /// Started; completion is observed later (e.g. clock polling).
    Pending,
    /// Refused; the service returns to `Inactive`.
    Failed,
}

/// Callback the scheduler invokes for every service it activates.
pub trait Activator {
    fn activate(&mut self, kind: ServiceKind) -> Activation;
}

// ═══════════════════════════════════════════════════════════════
//  Tick report
// ═══════════════════════════════════════════════════════════════

/// Order in which pulses are consumed within one tick.
pub const PULSE_ORDER: [ServiceKind; ServiceKind::COUNT] = [
    ServiceKind::Link,
    ServiceKind::TimeSync,
    ServiceKind::SecureTransport,
    ServiceKind::PubSub,
    ServiceKind::Messaging,
];

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pulses consumed.
    pub pulses: ServiceSet,
    /// Services that reached `Active` through an activation call.
    pub activated: ServiceSet,
    /// Services whose activation call failed.
    pub failed: ServiceSet,
    /// Services torn down because a prerequisite went away.
    pub dropped: ServiceSet,
}

impl TickReport {
    /// Nothing happened.
    pub fn is_quiet(&self) -> bool {
        self.pulses.is_empty()
            && self.activated.is_empty()
            && self.failed.is_empty()
            && self.dropped.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Passes
// ═══════════════════════════════════════════════════════════════

/// Tear down every service that is up (or coming up) while one of its
/// prerequisites is not `Active`, or all of them after a latched link drop.
///
/// Walks dependencies first so a dropped link empties the whole chain in
/// one pass.
pub fn sweep(table: &ServiceTable) -> ServiceSet {
    let root_lost = table.take_root_lost();
    let mut dropped = ServiceSet::EMPTY;
    for kind in ServiceKind::TOPO_ORDER {
        if kind == ServiceKind::Link || table.state(kind) == ServiceState::Inactive {
            continue;
        }
        if root_lost || !table.dependencies_active(kind) {
            table.apply(kind, ServiceEvent::Lost);
            dropped.insert(kind);
        }
    }
    if !dropped.is_empty() {
        warn!("Cascade: dependency lost, dropped {}", dropped);
    }
    dropped
}

/// Consume pending pulses and activate newly eligible services.
pub fn cascade(table: &ServiceTable, activator: &mut impl Activator) -> TickReport {
    let mut report = TickReport::default();

    for pulsed in PULSE_ORDER {
        if !table.take_pulse(pulsed) {
            continue;
        }
        report.pulses.insert(pulsed);

        // The link is the root: anything whose prerequisites are all up is
        // eligible.  Every other pulse only wakes its direct dependents.
        let candidates = if pulsed == ServiceKind::Link {
            table.effective().difference(ServiceSet::from(ServiceKind::Link))
        } else {
            pulsed.dependents()
        };

        for target in ServiceKind::TOPO_ORDER {
            if candidates.contains(target) && table.effective().contains(target) {
                try_activate(table, target, activator, &mut report);
            }
        }
    }

    report
}

fn try_activate(
    table: &ServiceTable,
    kind: ServiceKind,
    activator: &mut impl Activator,
    report: &mut TickReport,
) {
    if table.state(kind) != ServiceState::Inactive || !table.dependencies_active(kind) {
        return;
    }
    if table.apply(kind, ServiceEvent::ActivationRequested).is_none() {
        return;
    }
    match activator.activate(kind) {
        Activation::Ready => {
            table.apply(kind, ServiceEvent::Succeeded);
            report.activated.insert(kind);
        }
        Activation::Pending => debug!("{}: activation in progress", kind),
        Activation::Failed => {
            warn!("{}: activation failed, waiting for next pulse", kind);
            table.apply(kind, ServiceEvent::Failed);
            report.failed.insert(kind);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
