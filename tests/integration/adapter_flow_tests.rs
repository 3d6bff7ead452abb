//! The stack driven through the host simulations of the real adapters.

use netstage::adapters::device_id;
use netstage::adapters::mqtt::{MessageHandler, MqttSession};
use netstage::adapters::sntp::SntpClock;
use netstage::adapters::telegram::TelegramBot;
use netstage::adapters::tls::TlsConfigurator;
use netstage::adapters::wifi::WifiLink;
use netstage::adapters::DeviceCollaborators;
use netstage::app::credentials::Credentials;
use netstage::app::ports::{MessageFormat, SendError};
use netstage::config::StackConfig;
use netstage::{Collaborators, ConnectivityStack, ServiceKind, ServiceSet, ServiceState};

use std::sync::{Arc, Mutex};

type DeviceStack = ConnectivityStack<WifiLink, SntpClock, TlsConfigurator, MqttSession, TelegramBot>;

fn device_stack(radio_wake_polls: u8) -> DeviceStack {
    device_stack_with(radio_wake_polls, None)
}

fn device_stack_with(radio_wake_polls: u8, handler: Option<MessageHandler>) -> DeviceStack {
    let config = StackConfig::from_json(
        r#"{
            "services": 24,
            "mqtt_host": "broker.local",
            "chat_id": "1234567",
            "timezone": "UTC0"
        }"#,
    )
    .unwrap();
    let client_id = device_id::client_id(&config.client_id_prefix, &device_id::read_mac());
    let mut pubsub = MqttSession::new(&config.mqtt_host, config.mqtt_port);
    if let Some(handler) = handler {
        pubsub = pubsub.with_handler(handler);
    }
    let io: DeviceCollaborators = Collaborators {
        link: WifiLink::new(radio_wake_polls),
        clock: SntpClock::new(),
        secure: TlsConfigurator::new(),
        pubsub,
        messaging: TelegramBot::new("123:ABC"),
    };
    ConnectivityStack::new(
        config,
        Credentials::new("HomeWiFi", "password1").unwrap(),
        &client_id,
        io,
    )
    .unwrap()
}

#[test]
fn full_bring_up_on_simulated_adapters() {
    let mut stack = device_stack(1);
    assert_eq!(stack.effective(), ServiceSet::ALL);

    // Radio still waking: the driver is not asked yet.
    stack.connect_link().unwrap();
    assert_eq!(stack.collaborators().link.attempts(), 0);
    stack.tick();
    assert_eq!(stack.collaborators().link.attempts(), 1);
    assert!(stack.collaborators().link.is_associated());

    stack.on_link_got_address();
    stack.tick();
    assert!(stack.is_active(ServiceKind::PubSub));
    assert_eq!(
        stack.collaborators().pubsub.sessions(),
        &["ESP-DEADBEEFCAFE".to_owned()]
    );
    assert_eq!(stack.collaborators().clock.sync_requests(), 1);
    assert_eq!(stack.collaborators().clock.timezone(), "UTC0");

    // Host clock is well past the threshold.
    stack.tick();
    assert!(stack.status().is_fully_up(), "{}", stack.status());
    assert_eq!(stack.collaborators().secure.configured(), 1);

    stack
        .send_message("<b>online</b>", MessageFormat::Html)
        .unwrap();
    let outbox = stack.collaborators().messaging.outbox();
    assert_eq!(outbox.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&outbox[0]).unwrap();
    assert_eq!(body["chat_id"], "1234567");
    assert_eq!(body["parse_mode"], "HTML");
}

#[test]
fn unsynchronised_clock_holds_the_chain() {
    let mut stack = device_stack(0);
    stack.collaborators_mut().clock.set_time(Some(3_600));
    stack.connect_link().unwrap();
    stack.on_link_got_address();
    for _ in 0..5 {
        stack.tick();
    }
    assert_eq!(
        stack.current_state(ServiceKind::TimeSync),
        ServiceState::Activating
    );
    assert_eq!(
        stack.current_state(ServiceKind::SecureTransport),
        ServiceState::Inactive
    );
    // PubSub only needs the link.
    assert!(stack.is_active(ServiceKind::PubSub));

    stack.collaborators_mut().clock.set_time(None);
    stack.tick();
    assert!(stack.is_ready_to_send());
}

#[test]
fn malformed_trust_anchor_keeps_tls_down() {
    let mut stack = device_stack(0);
    stack.set_trust_anchor(b"-----BEGIN CERTIFICATE-----\nnot base64!\n-----END CERTIFICATE-----\n");
    stack.connect_link().unwrap();
    stack.on_link_got_address();
    stack.tick();
    stack.tick();
    assert_eq!(
        stack.current_state(ServiceKind::SecureTransport),
        ServiceState::Inactive
    );
    assert_eq!(stack.collaborators().secure.configured(), 0);
    assert!(stack.session_cache().is_empty());
}

#[test]
fn tls_session_resumes_after_link_flap() {
    let mut stack = device_stack(0);
    stack.connect_link().unwrap();
    stack.on_link_got_address();
    stack.tick();
    stack.tick();
    assert!(stack.is_ready_to_send());

    stack.on_link_disconnected();
    stack.tick();
    stack.on_link_got_address();
    stack.tick();
    stack.tick();
    assert!(stack.is_ready_to_send());
    assert_eq!(stack.collaborators().secure.resumed(), 1);
    assert_eq!(stack.collaborators().pubsub.sessions().len(), 2);
}

#[test]
fn refused_join_reports_error() {
    let mut stack = device_stack(0);
    stack.collaborators_mut().link.fail_next_connect();
    assert!(stack.connect_link().is_err());
    assert_eq!(stack.current_state(ServiceKind::Link), ServiceState::Inactive);
    stack.connect_link().unwrap();
    assert_eq!(stack.collaborators().link.attempts(), 2);
}

#[test]
fn mqtt_round_trip_through_the_stack() {
    let inbox: Arc<Mutex<Vec<(String, Vec<u8>)>>> = Arc::default();
    let sink = Arc::clone(&inbox);
    let mut stack = device_stack_with(
        0,
        Some(Arc::new(move |topic: &str, payload: &[u8]| {
            sink.lock().unwrap().push((topic.to_owned(), payload.to_vec()));
        })),
    );
    assert_eq!(stack.subscribe("device/cmd"), Err(SendError::NotReady));

    stack.connect_link().unwrap();
    stack.on_link_got_address();
    stack.tick();
    assert!(stack.is_ready_to_publish());

    stack.subscribe("device/cmd").unwrap();
    stack.publish("device/state", b"online").unwrap();
    assert_eq!(
        stack.collaborators().pubsub.published(),
        &[("device/state".to_owned(), b"online".to_vec())]
    );
    assert!(stack.collaborators().pubsub.deliver("device/cmd", b"ping"));
    assert_eq!(
        *inbox.lock().unwrap(),
        vec![("device/cmd".to_owned(), b"ping".to_vec())]
    );

    // Broker gone while the link stays up: PubSub stays Active but refuses.
    stack.collaborators_mut().pubsub.drop_broker();
    assert!(stack.is_active(ServiceKind::PubSub));
    assert_eq!(stack.publish("device/state", b"x"), Err(SendError::Rejected));
}

#[test]
fn subscriptions_are_renewed_by_caller_after_link_flap() {
    let mut stack = device_stack(0);
    stack.connect_link().unwrap();
    stack.on_link_got_address();
    stack.tick();
    stack.subscribe("device/cmd").unwrap();

    stack.on_link_disconnected();
    stack.tick();
    assert_eq!(stack.publish("device/state", b"x"), Err(SendError::NotReady));

    stack.on_link_got_address();
    stack.tick();
    assert!(stack.collaborators().pubsub.subscriptions().is_empty());
    stack.subscribe("device/cmd").unwrap();
    assert_eq!(
        stack.collaborators().pubsub.subscriptions(),
        &["device/cmd".to_owned()]
    );
}
