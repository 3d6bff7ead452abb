//! MQTT pub/sub session.
//!
//! Implements [`PubSubClient`].  A session is opened once per activation
//! of the PubSub service; a later activation (after a link drop) replaces
//! the previous client.  Inbound messages go to the [`MessageHandler`]
//! given at construction, which outlives any single session.
//!
//! `connect` only creates the client and issues the connect request, so
//! PubSub turns `Active` before the broker has answered.  The broker's
//! connected/disconnected events are tracked separately and `publish` /
//! `subscribe` are refused while the broker session is down.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` against `mqtt://host:port`.
//! - **all other targets**: records sessions, publishes and subscriptions;
//!   [`MqttSession::deliver`] feeds an inbound message to the handler.

use core::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::app::ports::PubSubClient;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

pub type BrokerUrl = heapless::String<96>;

/// Receives `(topic, payload)` for every inbound message.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

pub struct MqttSession {
    url: BrokerUrl,
    handler: Option<MessageHandler>,
    /// Broker has acknowledged the current session.
    broker_up: Arc<AtomicBool>,

    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,

    #[cfg(not(target_os = "espidf"))]
    sessions: Vec<String>,
    #[cfg(not(target_os = "espidf"))]
    published: Vec<(String, Vec<u8>)>,
    #[cfg(not(target_os = "espidf"))]
    subscriptions: Vec<String>,
    #[cfg(not(target_os = "espidf"))]
    fail_next: bool,
}

impl MqttSession {
    pub fn new(host: &str, port: u16) -> Self {
        let mut url = BrokerUrl::new();
        if write!(url, "mqtt://{host}:{port}").is_err() {
            warn!("MQTT: broker url truncated");
        }
        Self {
            url,
            handler: None,
            broker_up: Arc::new(AtomicBool::new(false)),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sessions: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            published: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            subscriptions: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            fail_next: false,
        }
    }

    /// Route inbound messages of every later session to `handler`.
    pub fn with_handler(mut self, handler: MessageHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_broker_connected(&self) -> bool {
        self.broker_up.load(Ordering::Acquire)
    }

    /// Simulation: client ids of every accepted session, oldest first.
    #[cfg(not(target_os = "espidf"))]
    pub fn sessions(&self) -> &[String] {
        &self.sessions
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[(String, Vec<u8>)] {
        &self.published
    }

    /// Simulation: topics subscribed in the current session.
    #[cfg(not(target_os = "espidf"))]
    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Simulation: the broker refuses the next session.
    #[cfg(not(target_os = "espidf"))]
    pub fn fail_next_connect(&mut self) {
        self.fail_next = true;
    }

    /// Simulation: the broker drops the session without a link loss.
    #[cfg(not(target_os = "espidf"))]
    pub fn drop_broker(&mut self) {
        self.broker_up.store(false, Ordering::Release);
    }

    /// Simulation: an inbound message on `topic`.  Returns `true` if it
    /// matched a subscription and reached the handler.
    #[cfg(not(target_os = "espidf"))]
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> bool {
        if !self.is_broker_connected() || !self.subscriptions.iter().any(|t| t == topic) {
            return false;
        }
        match &self.handler {
            Some(handler) => {
                handler(topic, payload);
                true
            }
            None => false,
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, client_id: &str) -> bool {
        // Drop the previous client before opening a new one.
        self.client = None;
        self.broker_up.store(false, Ordering::Release);
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            ..Default::default()
        };
        let broker_up = Arc::clone(&self.broker_up);
        let handler = self.handler.clone();
        match EspMqttClient::new_cb(&self.url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => {
                info!("MQTT(espidf): broker session up");
                broker_up.store(true, Ordering::Release);
            }
            EventPayload::Disconnected => {
                warn!("MQTT(espidf): broker session down");
                broker_up.store(false, Ordering::Release);
            }
            EventPayload::Received { topic, data, .. } => {
                if let Some(handler) = &handler {
                    handler(topic.unwrap_or_default(), data);
                }
            }
            other => log::debug!("MQTT: {:?}", other),
        }) {
            Ok(client) => {
                self.client = Some(client);
                true
            }
            Err(e) => {
                warn!("MQTT(espidf): client start failed: {}", e);
                false
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, client_id: &str) -> bool {
        self.subscriptions.clear();
        if core::mem::take(&mut self.fail_next) {
            warn!("MQTT(sim): simulated broker refusal");
            self.broker_up.store(false, Ordering::Release);
            return false;
        }
        self.sessions.push(client_id.to_owned());
        self.broker_up.store(true, Ordering::Release);
        true
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        let Some(client) = self.client.as_mut() else {
            return false;
        };
        match client.publish(topic, QoS::AtLeastOnce, false, payload) {
            Ok(_) => true,
            Err(e) => {
                warn!("MQTT(espidf): publish to {} failed: {}", topic, e);
                false
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        self.published.push((topic.to_owned(), payload.to_vec()));
        true
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) -> bool {
        let Some(client) = self.client.as_mut() else {
            return false;
        };
        match client.subscribe(topic, QoS::AtLeastOnce) {
            Ok(_) => true,
            Err(e) => {
                warn!("MQTT(espidf): subscribe to {} failed: {}", topic, e);
                false
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) -> bool {
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_owned());
        }
        true
    }
}

impl PubSubClient for MqttSession {
    fn connect(&mut self, client_id: &str) -> bool {
        info!("MQTT: connecting to {} as {}", self.url, client_id);
        self.platform_connect(client_id)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.is_broker_connected() {
            warn!("MQTT: publish to {} refused, broker session down", topic);
            return false;
        }
        self.platform_publish(topic, payload)
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        if !self.is_broker_connected() {
            warn!("MQTT: subscribe to {} refused, broker session down", topic);
            return false;
        }
        info!("MQTT: subscribing to {}", topic);
        self.platform_subscribe(topic)
    }
}
