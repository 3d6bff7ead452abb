//! Port traits — the boundary between the orchestrator and the vendored
//! network stacks it sequences.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ConnectivityStack (domain)
//! ```
//!
//! The orchestrator decides *when* each collaborator is called.  The
//! collaborators never see orchestrator state; they only answer with
//! booleans or typed errors.

use core::fmt;

use super::credentials::Credentials;

// ───────────────────────────────────────────────────────────────
// Link driver (WiFi station)
// ───────────────────────────────────────────────────────────────

/// Radio power as reported by a non-blocking poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioPower {
    Off,
    /// Waking from modem sleep; poll again next tick.
    Transitioning,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    /// The radio did not power up.
    RadioOff,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::RadioOff => write!(f, "radio is powered off"),
        }
    }
}

/// Starts and stops the station link.  Progress is reported back through
/// [`LinkEvent`](crate::events::LinkEvent)s, not return values.
pub trait LinkDriver {
    /// Begin joining the network.  Returns once the request is issued.
    fn connect(&mut self, credentials: &Credentials) -> Result<(), LinkError>;

    fn disconnect(&mut self);

    /// Advance any pending power transition without blocking.
    fn poll_power(&mut self) -> RadioPower {
        RadioPower::On
    }
}

// ───────────────────────────────────────────────────────────────
// Clock source
// ───────────────────────────────────────────────────────────────

/// Wall clock, set in the background by SNTP.
pub trait ClockSource {
    /// Seconds since the Unix epoch.
    fn now(&self) -> i64;

    /// Point the background sync at `servers` and apply the POSIX TZ rule.
    fn start_sync(&mut self, servers: &[&str], timezone: &str) {
        let _ = (servers, timezone);
    }
}

// ───────────────────────────────────────────────────────────────
// Secure transport
// ───────────────────────────────────────────────────────────────

/// Maximum stored TLS session ticket.
pub const SESSION_TICKET_MAX: usize = 256;

/// TLS session state kept across connections for resumption.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    ticket: heapless::Vec<u8, SESSION_TICKET_MAX>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached ticket.  Returns `false` if it does not fit.
    pub fn store(&mut self, ticket: &[u8]) -> bool {
        self.ticket.clear();
        if self.ticket.extend_from_slice(ticket).is_err() {
            self.ticket.clear();
            return false;
        }
        true
    }

    pub fn ticket(&self) -> &[u8] {
        &self.ticket
    }

    pub fn is_empty(&self) -> bool {
        self.ticket.is_empty()
    }

    pub fn clear(&mut self) {
        self.ticket.clear();
    }
}

/// Installs the trust anchor for outbound TLS connections.
pub trait SecureTransportProvider {
    /// `trust_anchor` is PEM text.  Returns `false` on any failure,
    /// including a malformed anchor.
    fn configure(&mut self, trust_anchor: &[u8], session_cache: &mut SessionCache) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Pub/sub client
// ───────────────────────────────────────────────────────────────

/// Broker session.  Inbound messages go to a handler the adapter was
/// built with, never through the orchestrator.
pub trait PubSubClient {
    fn connect(&mut self, client_id: &str) -> bool;

    /// Queue `payload` on `topic`.  Returns `false` if it was refused.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool;

    /// Ask the broker for `topic`.  Lasts until the session is replaced.
    fn subscribe(&mut self, topic: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Messaging client
// ───────────────────────────────────────────────────────────────

/// Text formatting understood by the bot API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    #[default]
    Plain,
    Markdown,
    Html,
}

impl MessageFormat {
    /// Value for the API's `parse_mode` field; `None` for plain text.
    pub const fn parse_mode(self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Markdown => Some("Markdown"),
            Self::Html => Some("HTML"),
        }
    }
}

pub trait MessagingClient {
    fn send(&mut self, chat_id: &str, text: &str, format: MessageFormat) -> bool;
}

/// Outcome of an outbound call gated on a service being `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The service is not `Active`; the client was not called.
    NotReady,
    /// The client refused or failed to deliver.
    Rejected,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "service not ready"),
            Self::Rejected => write!(f, "message rejected"),
        }
    }
}
