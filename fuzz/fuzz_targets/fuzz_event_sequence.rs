//! Fuzz target: `ConnectivityStack` under arbitrary event sequences
//!
//! Each input byte is one operation: a link event, a tick, a clock jump,
//! a collaborator outcome flip, a repulse, a send or a reset.  Checks:
//! - No panics for any sequence
//! - Kinds outside the effective set never leave Inactive
//! - A pulse is only ever pending on an Active service
//! - `send` never reaches the client unless Messaging is Active
//!
//! cargo fuzz run fuzz_event_sequence

#![no_main]

use libfuzzer_sys::fuzz_target;
use netstage::app::credentials::Credentials;
use netstage::app::ports::{
    ClockSource, LinkDriver, LinkError, MessageFormat, MessagingClient, PubSubClient,
    SecureTransportProvider, SendError, SessionCache,
};
use netstage::config::StackConfig;
use netstage::{Collaborators, ConnectivityStack, ServiceKind, ServiceSet, ServiceState};

struct Radio {
    refuse: bool,
}

impl LinkDriver for Radio {
    fn connect(&mut self, _: &Credentials) -> Result<(), LinkError> {
        if self.refuse { Err(LinkError::ConnectionFailed) } else { Ok(()) }
    }
    fn disconnect(&mut self) {}
}

struct Clock(i64);
impl ClockSource for Clock {
    fn now(&self) -> i64 {
        self.0
    }
}

struct Tls(bool);
impl SecureTransportProvider for Tls {
    fn configure(&mut self, _: &[u8], cache: &mut SessionCache) -> bool {
        if self.0 {
            cache.store(b"t");
        }
        self.0
    }
}

struct Broker(bool);
impl PubSubClient for Broker {
    fn connect(&mut self, _: &str) -> bool {
        self.0
    }
    fn publish(&mut self, _: &str, _: &[u8]) -> bool {
        self.0
    }
    fn subscribe(&mut self, _: &str) -> bool {
        self.0
    }
}

struct Outbox(u32);
impl MessagingClient for Outbox {
    fn send(&mut self, _: &str, _: &str, _: MessageFormat) -> bool {
        self.0 += 1;
        true
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&first, ops)) = data.split_first() else {
        return;
    };

    let mut config = StackConfig {
        services: ServiceSet::from_bits_truncate(first),
        ..StackConfig::default()
    };
    let _ = config.mqtt_host.push_str("broker");
    let _ = config.chat_id.push_str("1");
    let io = Collaborators {
        link: Radio { refuse: false },
        clock: Clock(0),
        secure: Tls(true),
        pubsub: Broker(true),
        messaging: Outbox(0),
    };
    let Ok(credentials) = Credentials::new("Net", "") else {
        return;
    };
    let Ok(mut stack) = ConnectivityStack::new(config, credentials, "ESP-1", io) else {
        return;
    };
    let effective = stack.effective();

    for &op in ops {
        match op % 13 {
            0 => stack.on_link_connected(),
            1 => stack.on_link_disconnected(),
            2 => stack.on_link_got_address(),
            3 | 4 => {
                stack.tick();
            }
            5 => stack.collaborators_mut().clock.0 = i64::from(op) * 10_000_000,
            6 => stack.collaborators_mut().secure.0 ^= true,
            7 => stack.collaborators_mut().pubsub.0 ^= true,
            8 => {
                if let Some(kind) = ServiceKind::from_index(usize::from(op / 12) % 5) {
                    stack.repulse(kind);
                }
            }
            9 => {
                let ready = stack.is_ready_to_send();
                let before = stack.collaborators().messaging.0;
                let _ = stack.send_message("fuzz", MessageFormat::Plain);
                let sent = stack.collaborators().messaging.0 != before;
                assert_eq!(ready, sent);
            }
            10 => stack.reset(),
            11 => {
                let ready = stack.is_ready_to_publish();
                let result = stack.publish("fuzz/state", &[op]);
                if !ready {
                    assert_eq!(result, Err(SendError::NotReady));
                }
            }
            _ => {
                stack.collaborators_mut().link.refuse = op & 0x80 != 0;
                let _ = stack.connect_link();
            }
        }

        for kind in ServiceKind::ALL {
            let state = stack.current_state(kind);
            if !effective.contains(kind) {
                assert_eq!(state, ServiceState::Inactive);
            }
            if stack.has_pulse(kind) {
                assert_eq!(state, ServiceState::Active);
            }
        }
    }
});
