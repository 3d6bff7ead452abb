//! Connectivity stack — the orchestrator.
//!
//! [`ConnectivityStack`] owns the service state table, the collaborators
//! and the TLS session cache.  It exposes a hardware-agnostic API; all
//! network work flows through the port traits in [`ports`](super::ports),
//! so the whole stack runs against mocks on the host.
//!
//! ```text
//!  WiFi/IP events ──▶ EventIngress ──▶ ┌──────────────────────┐
//!                                      │   ConnectivityStack   │
//!  main loop ──────────── tick() ────▶ │ table · cascade · TLS │ ──▶ collaborators
//!                                      └──────────────────────┘
//! ```
//!
//! Each tick runs, in order: dependency-loss sweep, pending link connect,
//! clock sample, pulse cascade.

use std::sync::Arc;

use log::{info, warn};

use crate::catalog::{ServiceKind, ServiceSet};
use crate::certs::DEFAULT_TRUST_ANCHOR;
use crate::config::StackConfig;
use crate::error::{Error, Result};
use crate::events::EventIngress;
use crate::fsm::{ServiceEvent, ServiceState, ServiceTable, StackStatus};
use crate::scheduler::{self, Activation, Activator, TickReport};

use super::credentials::Credentials;
use super::ports::{
    ClockSource, LinkDriver, MessageFormat, MessagingClient, PubSubClient, RadioPower,
    SecureTransportProvider, SendError, SessionCache,
};

pub const CLIENT_ID_MAX: usize = 32;

// ───────────────────────────────────────────────────────────────
// Collaborators
// ───────────────────────────────────────────────────────────────

/// The external components the stack sequences.
pub struct Collaborators<L, C, S, P, M> {
    pub link: L,
    pub clock: C,
    pub secure: S,
    pub pubsub: P,
    pub messaging: M,
}

// ───────────────────────────────────────────────────────────────
// ConnectivityStack
// ───────────────────────────────────────────────────────────────

pub struct ConnectivityStack<L, C, S, P, M> {
    config: StackConfig,
    table: Arc<ServiceTable>,
    ingress: EventIngress,
    io: Collaborators<L, C, S, P, M>,
    credentials: Credentials,
    client_id: heapless::String<CLIENT_ID_MAX>,
    trust_anchor: &'static [u8],
    session: SessionCache,
    /// `connect_link` was called and the driver has not been asked yet.
    connect_pending: bool,
    tick_count: u64,
}

impl<L, C, S, P, M> ConnectivityStack<L, C, S, P, M>
where
    L: LinkDriver,
    C: ClockSource,
    S: SecureTransportProvider,
    P: PubSubClient,
    M: MessagingClient,
{
    /// Validate `config` and build the stack with every service `Inactive`.
    ///
    /// Does **not** touch the radio — call [`connect_link`](Self::connect_link) next.
    pub fn new(
        config: StackConfig,
        credentials: Credentials,
        client_id: &str,
        io: Collaborators<L, C, S, P, M>,
    ) -> Result<Self> {
        config.validate()?;
        if client_id.is_empty() || !client_id.is_ascii() {
            return Err(Error::Config("client id must be non-empty ASCII"));
        }
        let mut id = heapless::String::new();
        id.push_str(client_id)
            .map_err(|()| Error::Config("client id too long"))?;

        let effective = config.effective_services();
        let table = Arc::new(ServiceTable::new(effective));
        info!(
            "Stack: requested {} -> effective {}",
            config.services, effective
        );

        Ok(Self {
            ingress: EventIngress::new(Arc::clone(&table)),
            table,
            config,
            io,
            credentials,
            client_id: id,
            trust_anchor: DEFAULT_TRUST_ANCHOR,
            session: SessionCache::new(),
            connect_pending: false,
            tick_count: 0,
        })
    }

    /// Replace the PEM trust anchor used when SecureTransport activates.
    pub fn set_trust_anchor(&mut self, anchor: &'static [u8]) {
        self.trust_anchor = anchor;
    }

    // ── Event entry points ────────────────────────────────────

    /// Handle for wiring platform callbacks to this instance.
    pub fn ingress(&self) -> EventIngress {
        self.ingress.clone()
    }

    pub fn on_link_connected(&self) {
        self.ingress.on_link_connected();
    }

    pub fn on_link_disconnected(&self) {
        self.ingress.on_link_disconnected();
    }

    pub fn on_link_got_address(&self) {
        self.ingress.on_link_got_address();
    }

    // ── Link control ──────────────────────────────────────────

    /// Start joining the network.  The driver is called as soon as the
    /// radio reports power; the link becomes `Active` on *got-address*.
    pub fn connect_link(&mut self) -> Result<()> {
        if !self.table.effective().contains(ServiceKind::Link) {
            return Err(Error::Config("link is not enabled"));
        }
        if self.table.state(ServiceKind::Link) != ServiceState::Inactive {
            return Ok(());
        }
        info!("Link: connecting to '{}'", self.credentials.ssid());
        self.table
            .apply(ServiceKind::Link, ServiceEvent::ActivationRequested);
        self.connect_pending = true;
        self.poll_pending_connect()
    }

    /// Leave the network.  Dependents are torn down on the next tick.
    pub fn disconnect_link(&mut self) {
        info!("Link: disconnecting");
        self.connect_pending = false;
        self.io.link.disconnect();
        self.ingress.on_link_disconnected();
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One non-blocking pass.  Call at `poll_interval_ms` cadence.
    pub fn tick(&mut self) -> TickReport {
        self.tick_count += 1;

        let dropped = scheduler::sweep(&self.table);

        if self.connect_pending {
            if let Err(e) = self.poll_pending_connect() {
                warn!("Link: connect failed: {}", e);
            }
        }

        if self.table.state(ServiceKind::TimeSync) == ServiceState::Activating {
            let now = self.io.clock.now();
            self.ingress
                .clock_sample(now, self.config.clock_sync_threshold_secs);
        }

        let mut activator = StackActivator {
            io: &mut self.io,
            config: &self.config,
            client_id: &self.client_id,
            trust_anchor: self.trust_anchor,
            session: &mut self.session,
        };
        let mut report = scheduler::cascade(&self.table, &mut activator);
        report.dropped = dropped;
        report
    }

    /// Force every service back to `Inactive` and forget pending work.
    pub fn reset(&mut self) {
        info!("Stack: reset");
        self.table.reset();
        self.connect_pending = false;
        self.session.clear();
    }

    /// Synthesize a pulse for an `Active` service so its dependents are
    /// re-examined on the next tick.  Returns `false` if it is not active.
    pub fn repulse(&self, kind: ServiceKind) -> bool {
        self.table.raise_pulse(kind)
    }

    // ── Messaging ─────────────────────────────────────────────

    pub fn is_ready_to_send(&self) -> bool {
        self.is_active(ServiceKind::Messaging)
    }

    /// Send `text` to the configured chat.  The client is only called
    /// while Messaging is `Active`.
    pub fn send_message(
        &mut self,
        text: &str,
        format: MessageFormat,
    ) -> core::result::Result<(), SendError> {
        if !self.is_ready_to_send() {
            return Err(SendError::NotReady);
        }
        if self
            .io
            .messaging
            .send(&self.config.chat_id, text, format)
        {
            Ok(())
        } else {
            warn!("Messaging: send rejected");
            Err(SendError::Rejected)
        }
    }

    // ── Pub/sub ───────────────────────────────────────────────

    pub fn is_ready_to_publish(&self) -> bool {
        self.is_active(ServiceKind::PubSub)
    }

    /// Publish `payload` on `topic`.  The client is only called while
    /// PubSub is `Active`.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> core::result::Result<(), SendError> {
        if !self.is_ready_to_publish() {
            return Err(SendError::NotReady);
        }
        if self.io.pubsub.publish(topic, payload) {
            Ok(())
        } else {
            warn!("PubSub: publish to {} rejected", topic);
            Err(SendError::Rejected)
        }
    }

    /// Subscribe the current broker session to `topic`.  Subscriptions do
    /// not survive a PubSub re-activation.
    pub fn subscribe(&mut self, topic: &str) -> core::result::Result<(), SendError> {
        if !self.is_ready_to_publish() {
            return Err(SendError::NotReady);
        }
        if self.io.pubsub.subscribe(topic) {
            Ok(())
        } else {
            warn!("PubSub: subscribe to {} rejected", topic);
            Err(SendError::Rejected)
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn current_state(&self, kind: ServiceKind) -> ServiceState {
        self.table.state(kind)
    }

    pub fn is_active(&self, kind: ServiceKind) -> bool {
        self.current_state(kind) == ServiceState::Active
    }

    pub fn has_pulse(&self, kind: ServiceKind) -> bool {
        self.table.has_pulse(kind)
    }

    pub fn status(&self) -> StackStatus {
        self.table.status()
    }

    pub fn requested(&self) -> ServiceSet {
        self.config.services
    }

    pub fn effective(&self) -> ServiceSet {
        self.table.effective()
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn session_cache(&self) -> &SessionCache {
        &self.session
    }

    /// Ticks executed since construction.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn collaborators(&self) -> &Collaborators<L, C, S, P, M> {
        &self.io
    }

    pub fn collaborators_mut(&mut self) -> &mut Collaborators<L, C, S, P, M> {
        &mut self.io
    }

    // ── Internal ──────────────────────────────────────────────

    fn poll_pending_connect(&mut self) -> Result<()> {
        // A disconnect or reset while the radio was waking cancels the request.
        if self.table.state(ServiceKind::Link) != ServiceState::Activating {
            self.connect_pending = false;
            return Ok(());
        }
        match self.io.link.poll_power() {
            RadioPower::On => {}
            RadioPower::Transitioning => return Ok(()),
            RadioPower::Off => {
                self.connect_pending = false;
                self.table.apply(ServiceKind::Link, ServiceEvent::Failed);
                return Err(crate::app::ports::LinkError::RadioOff.into());
            }
        }
        self.connect_pending = false;
        if let Err(e) = self.io.link.connect(&self.credentials) {
            self.table.apply(ServiceKind::Link, ServiceEvent::Failed);
            return Err(e.into());
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Activator over the collaborators
// ───────────────────────────────────────────────────────────────

struct StackActivator<'a, L, C, S, P, M> {
    io: &'a mut Collaborators<L, C, S, P, M>,
    config: &'a StackConfig,
    client_id: &'a str,
    trust_anchor: &'a [u8],
    session: &'a mut SessionCache,
}

impl<L, C, S, P, M> Activator for StackActivator<'_, L, C, S, P, M>
where
    L: LinkDriver,
    C: ClockSource,
    S: SecureTransportProvider,
    P: PubSubClient,
    M: MessagingClient,
{
    fn activate(&mut self, kind: ServiceKind) -> Activation {
        match kind {
            // Driven by connect_link and got-address, never by a pulse.
            ServiceKind::Link => Activation::Pending,
            ServiceKind::TimeSync => {
                let servers = self.config.ntp_server_names();
                self.io.clock.start_sync(&servers, &self.config.timezone);
                info!("TimeSync: waiting for clock via {:?}", servers.as_slice());
                Activation::Pending
            }
            ServiceKind::SecureTransport => {
                if self.io.secure.configure(self.trust_anchor, self.session) {
                    Activation::Ready
                } else {
                    Activation::Failed
                }
            }
            ServiceKind::PubSub => {
                if self.io.pubsub.connect(self.client_id) {
                    info!("PubSub: connected as {}", self.client_id);
                    Activation::Ready
                } else {
                    Activation::Failed
                }
            }
            // Readiness to call `send` is the whole contract.
            ServiceKind::Messaging => Activation::Ready,
        }
    }
}
