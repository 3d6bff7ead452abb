//! Service catalog — the fixed set of staged services and the static
//! dependency relation between them.
//!
//! ```text
//!   Link
//!    |-- PubSub
//!    |-- TimeSync
//!         |-- SecureTransport   (also needs Link)
//!              |-- Messaging
//! ```
//!
//! The relation is checked for cycles at compile time; see
//! [`dependency_graph_is_acyclic`].

use core::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Service kind
// ---------------------------------------------------------------------------

/// One of the five staged capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ServiceKind {
    /// WiFi station link (association + DHCP address).
    Link = 0,
    /// Wall-clock synchronisation (SNTP).
    TimeSync = 1,
    /// TLS trust anchor and session cache.
    SecureTransport = 2,
    /// MQTT broker session.
    PubSub = 3,
    /// Telegram bot.
    Messaging = 4,
}

impl ServiceKind {
    /// Total number of kinds — used to size per-kind tables.
    pub const COUNT: usize = 5;

    /// Every kind, in discriminant order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Link,
        Self::TimeSync,
        Self::SecureTransport,
        Self::PubSub,
        Self::Messaging,
    ];

    /// Every kind appears after all of its dependencies.
    pub const TOPO_ORDER: [Self; Self::COUNT] = [
        Self::Link,
        Self::TimeSync,
        Self::PubSub,
        Self::SecureTransport,
        Self::Messaging,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Bit used for this kind inside a [`ServiceSet`].
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Direct prerequisites of this kind.
    pub const fn depends_on(self) -> ServiceSet {
        match self {
            Self::Link => ServiceSet::EMPTY,
            Self::TimeSync | Self::PubSub => ServiceSet::EMPTY.with(Self::Link),
            Self::SecureTransport => ServiceSet::EMPTY.with(Self::Link).with(Self::TimeSync),
            Self::Messaging => ServiceSet::EMPTY.with(Self::SecureTransport),
        }
    }

    /// Kinds that list `self` as a direct prerequisite.
    pub fn dependents(self) -> ServiceSet {
        Self::ALL
            .iter()
            .copied()
            .filter(|k| k.depends_on().contains(self))
            .collect()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Link => "Link",
            Self::TimeSync => "TimeSync",
            Self::SecureTransport => "SecureTransport",
            Self::PubSub => "PubSub",
            Self::Messaging => "Messaging",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Service set
// ---------------------------------------------------------------------------

/// A subset of [`ServiceKind`], stored as a bitmask.
///
/// Serialises as the raw `u8` mask so provisioning blobs stay compact;
/// bits outside the five kinds are rejected on deserialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ServiceSet(u8);

impl ServiceSet {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(0b0001_1111);

    /// Build a set from a raw mask. Returns `None` if unknown bits are set.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL.0 == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Build a set from a raw mask, dropping unknown bits.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Copy of `self` with `kind` added.
    pub const fn with(self, kind: ServiceKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub fn insert(&mut self, kind: ServiceKind) {
        self.0 |= kind.bit();
    }

    pub const fn contains(self, kind: ServiceKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in discriminant order.
    pub fn iter(self) -> impl Iterator<Item = ServiceKind> {
        ServiceKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<ServiceKind> for ServiceSet {
    fn from_iter<I: IntoIterator<Item = ServiceKind>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl From<ServiceKind> for ServiceSet {
    fn from(kind: ServiceKind) -> Self {
        Self::EMPTY.with(kind)
    }
}

impl core::ops::BitOr for ServiceSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl core::ops::BitOr<ServiceKind> for ServiceSet {
    type Output = Self;

    fn bitor(self, rhs: ServiceKind) -> Self {
        self.with(rhs)
    }
}

impl TryFrom<u8> for ServiceSet {
    type Error = &'static str;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::from_bits(bits).ok_or("unknown service bits")
    }
}

impl From<ServiceSet> for u8 {
    fn from(set: ServiceSet) -> Self {
        set.0
    }
}

impl fmt::Display for ServiceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, kind) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(kind.name())?;
        }
        f.write_str("}")
    }
}

// ---------------------------------------------------------------------------
// Acyclicity
// ---------------------------------------------------------------------------

/// `true` if no kind can reach itself through `depends_on`.
pub const fn dependency_graph_is_acyclic() -> bool {
    let mut i = 0;
    while i < ServiceKind::COUNT {
        let kind = ServiceKind::ALL[i];
        let mut reach = kind.depends_on().0;
        // A path longer than COUNT edges must revisit a node.
        let mut round = 0;
        while round < ServiceKind::COUNT {
            let mut j = 0;
            while j < ServiceKind::COUNT {
                let other = ServiceKind::ALL[j];
                if reach & other.bit() != 0 {
                    reach |= other.depends_on().0;
                }
                j += 1;
            }
            round += 1;
        }
        if reach & kind.bit() != 0 {
            return false;
        }
        i += 1;
    }
    true
}

const _: () = assert!(dependency_graph_is_acyclic(), "service dependency graph has a cycle");
