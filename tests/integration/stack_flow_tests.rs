//! End-to-end bring-up and teardown flows through `ConnectivityStack`
//! against recording mocks.

use netstage::app::ports::{MessageFormat, SendError};
use netstage::{ServiceKind, ServiceSet, ServiceState};

use crate::mock_net::{Call, Harness, SYNCED};

use ServiceKind::{Link, Messaging, PubSub, SecureTransport, TimeSync};

fn set(kinds: &[ServiceKind]) -> ServiceSet {
    kinds.iter().copied().collect()
}

fn assert_all_inactive(h: &Harness) {
    for kind in ServiceKind::ALL {
        assert_eq!(
            h.stack.current_state(kind),
            ServiceState::Inactive,
            "{kind} should be Inactive"
        );
        assert!(!h.stack.has_pulse(kind), "{kind} should have no pulse");
    }
}

// ── Full messaging chain ──────────────────────────────────────

#[test]
fn messaging_chain_comes_up_in_dependency_order() {
    let mut h = Harness::new(ServiceSet::from(Messaging));
    assert_eq!(
        h.stack.effective(),
        set(&[Link, TimeSync, SecureTransport, Messaging])
    );

    h.stack.connect_link().unwrap();
    assert_eq!(h.stack.current_state(Link), ServiceState::Activating);

    h.stack.on_link_got_address();
    let report = h.stack.tick();
    assert_eq!(report.pulses, ServiceSet::from(Link));
    assert_eq!(h.stack.current_state(TimeSync), ServiceState::Activating);
    assert_eq!(h.stack.current_state(SecureTransport), ServiceState::Inactive);

    // Clock not yet past the threshold: nothing moves.
    let report = h.stack.tick();
    assert!(report.is_quiet());
    assert_eq!(h.stack.current_state(TimeSync), ServiceState::Activating);

    h.set_clock(SYNCED);
    let report = h.stack.tick();
    assert_eq!(report.activated, set(&[SecureTransport, Messaging]));
    for kind in [Link, TimeSync, SecureTransport, Messaging] {
        assert!(h.stack.is_active(kind), "{kind} should be Active");
    }
    assert_eq!(h.stack.current_state(PubSub), ServiceState::Inactive);

    let calls = h.calls();
    assert_eq!(
        calls,
        vec![
            Call::LinkConnect { ssid: "HomeWiFi".into() },
            Call::ClockStart {
                servers: vec!["nl.pool.ntp.org".into(), "pool.ntp.org".into()],
            },
            Call::SecureConfigure { resumed: false },
        ]
    );
    assert_eq!(h.count(|c| matches!(c, Call::PubSubConnect { .. })), 0);
}

#[test]
fn settled_stack_ticks_quietly() {
    let mut h = Harness::new(ServiceSet::from(Messaging));
    h.bring_up();
    let before = h.stack.status();
    h.clear_calls();

    for _ in 0..5 {
        assert!(h.stack.tick().is_quiet());
    }
    assert_eq!(h.stack.status(), before);
    assert!(h.calls().is_empty());
}

#[test]
fn send_reaches_client_only_when_active() {
    let mut h = Harness::new(ServiceSet::from(Messaging));
    assert_eq!(
        h.stack.send_message("too early", MessageFormat::Plain),
        Err(SendError::NotReady)
    );

    h.bring_up();
    h.stack
        .send_message("*online*", MessageFormat::Markdown)
        .unwrap();
    assert_eq!(
        h.calls().last(),
        Some(&Call::Send {
            chat_id: "1234567".into(),
            text: "*online*".into(),
            format: MessageFormat::Markdown,
        })
    );
}

#[test]
fn client_refusal_is_rejected() {
    let mut h = Harness::new(ServiceSet::from(Messaging));
    h.bring_up();
    h.stack.collaborators_mut().messaging.accept = false;
    assert_eq!(
        h.stack.send_message("hi", MessageFormat::Plain),
        Err(SendError::Rejected)
    );
    // Refusal is not a lifecycle event.
    assert!(h.stack.is_active(Messaging));
}

// ── Pub/sub retry ─────────────────────────────────────────────

#[test]
fn failed_pubsub_retries_on_next_link_pulse() {
    let mut h = Harness::new(ServiceSet::from(PubSub));
    h.stack.collaborators_mut().pubsub.outcomes = vec![false, true];

    h.stack.connect_link().unwrap();
    h.stack.on_link_got_address();
    let report = h.stack.tick();
    assert_eq!(report.failed, ServiceSet::from(PubSub));
    assert_eq!(h.stack.current_state(PubSub), ServiceState::Inactive);

    // No pulse, no retry.
    h.stack.tick();
    assert_eq!(h.count(|c| matches!(c, Call::PubSubConnect { .. })), 1);

    assert!(h.stack.repulse(Link));
    h.stack.tick();
    assert!(h.stack.is_active(PubSub));
    assert_eq!(h.count(|c| matches!(c, Call::PubSubConnect { .. })), 2);
}

#[test]
fn address_renewal_repulses_link() {
    let mut h = Harness::new(ServiceSet::from(PubSub));
    h.stack.collaborators_mut().pubsub.outcomes = vec![false];
    h.stack.connect_link().unwrap();
    h.stack.on_link_got_address();
    h.stack.tick();
    assert_eq!(h.stack.current_state(PubSub), ServiceState::Inactive);

    h.stack.on_link_got_address();
    h.stack.tick();
    assert!(h.stack.is_active(PubSub));
}

#[test]
fn pubsub_uses_device_client_id() {
    let mut h = Harness::new(ServiceSet::from(PubSub));
    h.bring_up();
    assert!(h.calls().contains(&Call::PubSubConnect {
        client_id: "ESP-DEADBEEFCAFE".into()
    }));
}

#[test]
fn pubsub_only_never_touches_time_or_tls() {
    let mut h = Harness::new(ServiceSet::from(PubSub));
    assert_eq!(h.stack.effective(), set(&[Link, PubSub]));

    h.bring_up();
    for _ in 0..3 {
        h.stack.tick();
    }
    assert!(h.stack.is_active(PubSub));
    for kind in [TimeSync, SecureTransport, Messaging] {
        assert_eq!(h.stack.current_state(kind), ServiceState::Inactive);
    }
    assert_eq!(h.count(|c| matches!(c, Call::ClockStart { .. })), 0);
    assert_eq!(h.count(|c| matches!(c, Call::SecureConfigure { .. })), 0);
}

#[test]
fn publish_reaches_broker_only_while_pubsub_active() {
    let mut h = Harness::new(ServiceSet::from(PubSub));
    assert_eq!(h.stack.publish("device/state", b"early"), Err(SendError::NotReady));
    assert_eq!(h.stack.subscribe("device/cmd"), Err(SendError::NotReady));
    assert_eq!(h.count(|c| matches!(c, Call::Publish { .. } | Call::Subscribe { .. })), 0);

    h.bring_up();
    h.stack.subscribe("device/cmd").unwrap();
    h.stack.publish("device/state", b"up").unwrap();
    let calls = h.calls();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[
            Call::Subscribe { topic: "device/cmd".into() },
            Call::Publish {
                topic: "device/state".into(),
                payload: b"up".to_vec(),
            },
        ]
    );

    h.stack.on_link_disconnected();
    h.stack.tick();
    h.clear_calls();
    assert_eq!(h.stack.publish("device/state", b"lost"), Err(SendError::NotReady));
    assert!(h.calls().is_empty());
}

// ── Trust anchor failures ─────────────────────────────────────

#[test]
fn refused_trust_anchor_is_retried_on_next_pulse() {
    let mut h = Harness::new(ServiceSet::from(Messaging));
    h.stack.collaborators_mut().secure.outcomes = vec![false];
    h.bring_up();
    assert_eq!(h.stack.current_state(SecureTransport), ServiceState::Inactive);
    assert_eq!(h.stack.current_state(Messaging), ServiceState::Inactive);

    assert!(h.stack.repulse(TimeSync));
    h.stack.tick();
    assert!(h.stack.is_active(SecureTransport));
    assert!(h.stack.is_active(Messaging));
    assert_eq!(h.count(|c| matches!(c, Call::SecureConfigure { .. })), 2);
}

// ── Link loss ─────────────────────────────────────────────────

#[test]
fn link_loss_tears_down_every_dependent_in_one_tick() {
    let mut h = Harness::new(ServiceSet::from(Messaging));
    h.bring_up();
    assert!(h.stack.is_active(SecureTransport));

    h.stack.on_link_disconnected();
    assert_eq!(h.stack.current_state(Link), ServiceState::Inactive);

    let report = h.stack.tick();
    assert_eq!(report.dropped, set(&[TimeSync, SecureTransport, Messaging]));
    assert_all_inactive(&h);

    h.clear_calls();
    assert_eq!(
        h.stack.send_message("lost", MessageFormat::Plain),
        Err(SendError::NotReady)
    );
    assert_eq!(h.count(|c| matches!(c, Call::Send { .. })), 0);
}

#[test]
fn drop_and_reacquire_between_ticks_rebuilds_chain() {
    let mut h = Harness::new(ServiceSet::from(Messaging));
    h.bring_up();
    h.clear_calls();

    h.stack.on_link_disconnected();
    h.stack.on_link_got_address();
    let report = h.stack.tick();
    assert_eq!(report.dropped, set(&[TimeSync, SecureTransport, Messaging]));
    assert!(h.stack.is_active(Link));
    assert_eq!(h.stack.current_state(TimeSync), ServiceState::Activating);

    h.stack.tick();
    assert!(h.stack.is_active(Messaging));
    // The TLS session survived the link loss.
    assert!(h.calls().contains(&Call::SecureConfigure { resumed: true }));
}

#[test]
fn activating_time_sync_is_dropped_with_link() {
    let mut h = Harness::new(ServiceSet::from(TimeSync));
    h.stack.connect_link().unwrap();
    h.stack.on_link_got_address();
    h.stack.tick();
    assert_eq!(h.stack.current_state(TimeSync), ServiceState::Activating);

    h.stack.on_link_disconnected();
    h.set_clock(SYNCED);
    h.stack.tick();
    assert_eq!(h.stack.current_state(TimeSync), ServiceState::Inactive);
}

#[test]
fn disconnect_link_calls_driver_and_drops_chain() {
    let mut h = Harness::new(ServiceSet::from(Messaging));
    h.bring_up();
    h.stack.disconnect_link();
    assert_eq!(h.calls().last(), Some(&Call::LinkDisconnect));
    h.stack.tick();
    assert_all_inactive(&h);
}

#[test]
fn refused_link_connect_reverts_and_can_retry() {
    let mut h = Harness::new(ServiceSet::from(Link));
    h.stack.collaborators_mut().link.refuse = true;
    assert!(h.stack.connect_link().is_err());
    assert_eq!(h.stack.current_state(Link), ServiceState::Inactive);

    h.stack.collaborators_mut().link.refuse = false;
    h.stack.connect_link().unwrap();
    assert_eq!(h.stack.current_state(Link), ServiceState::Activating);
    assert_eq!(h.count(|c| matches!(c, Call::LinkConnect { .. })), 2);
}

// ── Reset ─────────────────────────────────────────────────────

#[test]
fn reset_forces_everything_inactive_and_is_idempotent() {
    let mut h = Harness::new(ServiceSet::ALL);
    h.bring_up();
    h.stack.on_link_got_address();
    assert!(h.stack.has_pulse(Link));
    assert!(!h.stack.session_cache().is_empty());
    h.clear_calls();

    h.stack.reset();
    assert_all_inactive(&h);
    assert!(h.stack.session_cache().is_empty());
    let after_first = h.stack.status();

    h.stack.reset();
    assert_eq!(h.stack.status(), after_first);
    assert!(h.calls().is_empty(), "reset must not call collaborators");

    // Nothing is pending: ticks stay quiet until the link is requested.
    assert!(h.stack.tick().is_quiet());
    assert_eq!(h.count(|c| matches!(c, Call::LinkConnect { .. })), 0);
}

#[test]
fn restart_after_reset() {
    let mut h = Harness::new(ServiceSet::from(Messaging));
    h.bring_up();
    h.stack.reset();
    h.bring_up();
    assert!(h.stack.is_ready_to_send());
}
