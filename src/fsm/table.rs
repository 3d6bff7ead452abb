//! Service state table shared between event ingestion and the scheduler.
//!
//! Link callbacks arrive on the ESP-IDF system event task while the
//! scheduler runs on the main task, so every cell is atomic.  State
//! changes go through [`transition`](super::transition) with a
//! compare-exchange loop; pulses are consumed with a single `swap`, so a
//! pulse raised concurrently with a tick is either seen by that tick or
//! left for the next one, never lost.
//!
//! Kinds outside the effective set are never written.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use log::info;

use super::{PulseAction, ServiceEvent, ServiceState, transition};
use crate::catalog::{ServiceKind, ServiceSet};

struct ServiceCell {
    state: AtomicU8,
    pulse: AtomicBool,
}

impl ServiceCell {
    const fn new() -> Self {
        Self {
            state: AtomicU8::new(ServiceState::Inactive as u8),
            pulse: AtomicBool::new(false),
        }
    }
}

/// Per-kind state + pulse for one orchestrator instance.
pub struct ServiceTable {
    effective: ServiceSet,
    cells: [ServiceCell; ServiceKind::COUNT],
    /// Latched by a link drop; consumed by the next tick's teardown sweep.
    root_lost: AtomicBool,
}

impl ServiceTable {
    pub fn new(effective: ServiceSet) -> Self {
        Self {
            effective,
            cells: [const { ServiceCell::new() }; ServiceKind::COUNT],
            root_lost: AtomicBool::new(false),
        }
    }

    pub fn effective(&self) -> ServiceSet {
        self.effective
    }

    pub fn state(&self, kind: ServiceKind) -> ServiceState {
        decode(self.cells[kind.index()].state.load(Ordering::Acquire))
    }

    pub fn has_pulse(&self, kind: ServiceKind) -> bool {
        self.cells[kind.index()].pulse.load(Ordering::Acquire)
    }

    /// Clear the pulse and report whether it was set.
    pub fn take_pulse(&self, kind: ServiceKind) -> bool {
        self.cells[kind.index()].pulse.swap(false, Ordering::AcqRel)
    }

    /// Set the pulse on an already-active kind.  Returns `false` (and does
    /// nothing) if `kind` is not active.
    ///
    /// The state is re-read after the store: if the kind was lost in
    /// between, the pulse is withdrawn again.  A concurrent re-activation
    /// raises its own pulse, which is restored if the withdrawal hit it.
    pub fn raise_pulse(&self, kind: ServiceKind) -> bool {
        if self.state(kind) != ServiceState::Active {
            return false;
        }
        let cell = &self.cells[kind.index()];
        let active = || decode(cell.state.load(Ordering::SeqCst)) == ServiceState::Active;
        cell.pulse.store(true, Ordering::SeqCst);
        loop {
            if active() {
                return true;
            }
            cell.pulse.store(false, Ordering::SeqCst);
            if !active() {
                return false;
            }
            cell.pulse.store(true, Ordering::SeqCst);
        }
    }

    /// Kinds currently `Active`.
    pub fn active_set(&self) -> ServiceSet {
        self.effective
            .iter()
            .filter(|k| self.state(*k) == ServiceState::Active)
            .collect()
    }

    /// `true` if every prerequisite of `kind` is `Active`.
    pub fn dependencies_active(&self, kind: ServiceKind) -> bool {
        kind.depends_on()
            .iter()
            .all(|dep| self.state(dep) == ServiceState::Active)
    }

    /// Feed `event` to `kind`'s state machine.
    ///
    /// Returns the resulting state, or `None` if the event does not apply
    /// in the current state or `kind` is not in the effective set.
    pub fn apply(&self, kind: ServiceKind, event: ServiceEvent) -> Option<ServiceState> {
        if !self.effective.contains(kind) {
            return None;
        }
        let cell = &self.cells[kind.index()];
        let mut current = cell.state.load(Ordering::Acquire);
        loop {
            let from = decode(current);
            let next = transition(from, event)?;
            match cell.state.compare_exchange_weak(
                current,
                next.to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    match next.pulse {
                        PulseAction::Raise => cell.pulse.store(true, Ordering::Release),
                        PulseAction::Clear => cell.pulse.store(false, Ordering::Release),
                        PulseAction::Keep => {}
                    }
                    if from != next.to {
                        info!("{}: {} -> {}", kind, from, next.to);
                    }
                    return Some(next.to);
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn mark_root_lost(&self) {
        self.root_lost.store(true, Ordering::Release);
    }

    pub fn take_root_lost(&self) -> bool {
        self.root_lost.swap(false, Ordering::AcqRel)
    }

    /// Force every kind back to `Inactive` with its pulse cleared.
    pub fn reset(&self) {
        for cell in &self.cells {
            cell.pulse.store(false, Ordering::Release);
            cell.state
                .store(ServiceState::Inactive as u8, Ordering::Release);
        }
        self.root_lost.store(false, Ordering::Release);
    }

    pub fn status(&self) -> StackStatus {
        let services = ServiceKind::ALL.map(|kind| ServiceStatus {
            kind,
            enabled: self.effective.contains(kind),
            state: self.state(kind),
            pulse: self.has_pulse(kind),
        });
        StackStatus { services }
    }
}

fn decode(raw: u8) -> ServiceState {
    ServiceState::from_u8(raw).unwrap_or_else(|| {
        debug_assert!(false, "corrupt service state byte: {raw}");
        ServiceState::Inactive
    })
}

// ---------------------------------------------------------------------------
// Status snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub kind: ServiceKind,
    /// Member of the effective set.
    pub enabled: bool,
    pub state: ServiceState,
    pub pulse: bool,
}

/// Point-in-time view of every service, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackStatus {
    pub services: [ServiceStatus; ServiceKind::COUNT],
}

impl StackStatus {
    pub fn get(&self, kind: ServiceKind) -> ServiceStatus {
        self.services[kind.index()]
    }

    /// Every enabled service is `Active`.
    pub fn is_fully_up(&self) -> bool {
        self.services
            .iter()
            .filter(|s| s.enabled)
            .all(|s| s.state == ServiceState::Active)
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.services.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if s.enabled {
                write!(f, "{}={}{}", s.kind, s.state, if s.pulse { "*" } else { "" })?;
            } else {
                write!(f, "{}=-", s.kind)?;
            }
        }
        Ok(())
    }
}
