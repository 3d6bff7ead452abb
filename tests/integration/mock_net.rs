//! Mock collaborators for integration tests.
//!
//! Every collaborator call is appended to one shared log so tests can
//! assert on the full call history, including ordering across
//! collaborators, without touching a radio.

use std::cell::RefCell;
use std::rc::Rc;

use netstage::app::credentials::Credentials;
use netstage::app::ports::{
    ClockSource, LinkDriver, LinkError, MessageFormat, MessagingClient, PubSubClient,
    SecureTransportProvider, SessionCache,
};
use netstage::app::service::{Collaborators, ConnectivityStack};
use netstage::config::StackConfig;
use netstage::ServiceSet;

/// A clock value comfortably past the sync threshold.
pub const SYNCED: i64 = 1_700_000_000;

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    LinkConnect { ssid: String },
    LinkDisconnect,
    ClockStart { servers: Vec<String> },
    SecureConfigure { resumed: bool },
    PubSubConnect { client_id: String },
    Publish { topic: String, payload: Vec<u8> },
    Subscribe { topic: String },
    Send { chat_id: String, text: String, format: MessageFormat },
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

// ── Link ──────────────────────────────────────────────────────

pub struct MockLink {
    log: CallLog,
    pub refuse: bool,
}

impl LinkDriver for MockLink {
    fn connect(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        self.log.borrow_mut().push(Call::LinkConnect {
            ssid: credentials.ssid().to_owned(),
        });
        if self.refuse {
            Err(LinkError::ConnectionFailed)
        } else {
            Ok(())
        }
    }

    fn disconnect(&mut self) {
        self.log.borrow_mut().push(Call::LinkDisconnect);
    }
}

// ── Clock ─────────────────────────────────────────────────────

pub struct MockClock {
    log: CallLog,
    pub now: i64,
}

impl ClockSource for MockClock {
    fn now(&self) -> i64 {
        self.now
    }

    fn start_sync(&mut self, servers: &[&str], _timezone: &str) {
        self.log.borrow_mut().push(Call::ClockStart {
            servers: servers.iter().map(|s| (*s).to_owned()).collect(),
        });
    }
}

// ── Secure transport ──────────────────────────────────────────

pub struct MockSecure {
    log: CallLog,
    /// Scripted outcomes, consumed front to back; `true` once exhausted.
    pub outcomes: Vec<bool>,
}

impl SecureTransportProvider for MockSecure {
    fn configure(&mut self, _trust_anchor: &[u8], session_cache: &mut SessionCache) -> bool {
        self.log.borrow_mut().push(Call::SecureConfigure {
            resumed: !session_cache.is_empty(),
        });
        let ok = if self.outcomes.is_empty() {
            true
        } else {
            self.outcomes.remove(0)
        };
        if ok && session_cache.is_empty() {
            session_cache.store(b"ticket");
        }
        ok
    }
}

// ── Pub/sub ───────────────────────────────────────────────────

pub struct MockPubSub {
    log: CallLog,
    pub outcomes: Vec<bool>,
}

impl PubSubClient for MockPubSub {
    fn connect(&mut self, client_id: &str) -> bool {
        self.log.borrow_mut().push(Call::PubSubConnect {
            client_id: client_id.to_owned(),
        });
        if self.outcomes.is_empty() {
            true
        } else {
            self.outcomes.remove(0)
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        self.log.borrow_mut().push(Call::Publish {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
        });
        true
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        self.log.borrow_mut().push(Call::Subscribe {
            topic: topic.to_owned(),
        });
        true
    }
}

// ── Messaging ─────────────────────────────────────────────────

pub struct MockMessaging {
    log: CallLog,
    pub accept: bool,
}

impl MessagingClient for MockMessaging {
    fn send(&mut self, chat_id: &str, text: &str, format: MessageFormat) -> bool {
        self.log.borrow_mut().push(Call::Send {
            chat_id: chat_id.to_owned(),
            text: text.to_owned(),
            format,
        });
        self.accept
    }
}

// ── Harness ───────────────────────────────────────────────────

pub type MockStack = ConnectivityStack<MockLink, MockClock, MockSecure, MockPubSub, MockMessaging>;

pub struct Harness {
    pub stack: MockStack,
    pub log: CallLog,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(services: ServiceSet) -> Self {
        let mut config = StackConfig {
            services,
            ..StackConfig::default()
        };
        config.mqtt_host.push_str("broker.local").unwrap();
        config.chat_id.push_str("1234567").unwrap();

        let log: CallLog = Rc::default();
        let io = Collaborators {
            link: MockLink { log: Rc::clone(&log), refuse: false },
            clock: MockClock { log: Rc::clone(&log), now: 0 },
            secure: MockSecure { log: Rc::clone(&log), outcomes: Vec::new() },
            pubsub: MockPubSub { log: Rc::clone(&log), outcomes: Vec::new() },
            messaging: MockMessaging { log: Rc::clone(&log), accept: true },
        };
        let stack = ConnectivityStack::new(
            config,
            Credentials::new("HomeWiFi", "password1").unwrap(),
            "ESP-DEADBEEFCAFE",
            io,
        )
        .unwrap();
        Self { stack, log }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.log.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn set_clock(&mut self, now: i64) {
        self.stack.collaborators_mut().clock.now = now;
    }

    /// Link up, clock synced, and enough ticks for the cascade to settle.
    pub fn bring_up(&mut self) {
        self.stack.connect_link().unwrap();
        self.stack.on_link_got_address();
        self.stack.tick();
        self.set_clock(SYNCED);
        self.stack.tick();
    }
}
