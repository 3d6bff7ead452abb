//! Per-service lifecycle state machine.
//!
//! Every service kind moves through the same three states.  The "just
//! became ready" signal is a separate pulse flag rather than a fourth
//! state, so a service can be steadily `Active` with or without
//! un-notified dependents.
//!
//! ```text
//!                 ActivationRequested
//!   ┌──────────┐ ───────────────────▶ ┌────────────┐
//!   │ Inactive │                      │ Activating │
//!   └──────────┘ ◀─────────────────── └────────────┘
//!        ▲   ▲          Failed              │
//!        │   │                              │ Succeeded (+pulse)
//!        │   │          Lost                ▼
//!        │   └─────────────────────── ┌────────────┐
//!        └──────────── Lost ───────── │   Active   │
//!                                     └────────────┘
//! ```
//!
//! `AddressAcquired` is the link layer's forced edge: any state goes
//! straight to `Active` with a pulse.

pub mod table;

use core::fmt;

use serde::{Deserialize, Serialize};

pub use table::{ServiceStatus, ServiceTable, StackStatus};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServiceState {
    #[default]
    Inactive = 0,
    Activating = 1,
    Active = 2,
}

impl ServiceState {
    /// Decode the raw byte stored in a [`ServiceTable`] cell.
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Inactive),
            1 => Some(Self::Activating),
            2 => Some(Self::Active),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Inactive => "Inactive",
            Self::Activating => "Activating",
            Self::Active => "Active",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Transition inputs and outputs
// ---------------------------------------------------------------------------

/// Everything that can move a service between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    /// The scheduler (or `connect_link`) starts bringing the service up.
    ActivationRequested,
    /// The collaborator call returned success, or the clock converged.
    Succeeded,
    /// The collaborator call returned failure.
    Failed,
    /// The link reported an address; forces `Active` from any state.
    AddressAcquired,
    /// The service itself or one of its prerequisites went away.
    Lost,
}

/// What to do with the pulse flag alongside a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseAction {
    Keep,
    Raise,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: ServiceState,
    pub pulse: PulseAction,
}

impl Transition {
    const fn new(to: ServiceState, pulse: PulseAction) -> Self {
        Self { to, pulse }
    }
}

/// The transition table.  `None` means the event is ignored in `from`.
pub const fn transition(from: ServiceState, event: ServiceEvent) -> Option<Transition> {
    use PulseAction::{Clear, Keep, Raise};
    use ServiceEvent::{ActivationRequested, AddressAcquired, Failed, Lost, Succeeded};
    use ServiceState::{Activating, Active, Inactive};

    match (from, event) {
        (Inactive, ActivationRequested) => Some(Transition::new(Activating, Keep)),
        (Activating, Succeeded) => Some(Transition::new(Active, Raise)),
        (Activating, Failed) => Some(Transition::new(Inactive, Keep)),
        (_, AddressAcquired) => Some(Transition::new(Active, Raise)),
        (Activating | Active, Lost) => Some(Transition::new(Inactive, Clear)),
        // A stale pulse can outlive its state; drop it even when already down.
        (Inactive, Lost) => Some(Transition::new(Inactive, Clear)),
        _ => None,
    }
}
