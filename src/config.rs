//! Stack configuration.
//!
//! Everything the orchestrator and its adapters need that is not a secret.
//! Missing fields in a provisioning blob fall back to [`Default`].

use serde::{Deserialize, Serialize};

use crate::catalog::{ServiceKind, ServiceSet};
use crate::error::{Error, Result};
use crate::resolver::closure;

/// One day past the epoch: anything earlier means SNTP has not landed.
pub const DEFAULT_CLOCK_SYNC_THRESHOLD_SECS: i64 = 24 * 3600;

pub const MAX_NTP_SERVERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    // --- Services ---
    /// Services the application asked for; dependencies are added on top.
    pub services: ServiceSet,

    // --- Timing ---
    /// Wall-clock value (seconds since epoch) that must be exceeded before
    /// time counts as synchronised.
    pub clock_sync_threshold_secs: i64,
    /// Main-loop tick cadence (milliseconds).
    pub poll_interval_ms: u32,

    // --- Time sync ---
    pub ntp_servers: heapless::Vec<heapless::String<32>, MAX_NTP_SERVERS>,
    /// POSIX TZ rule.
    pub timezone: heapless::String<48>,

    // --- Pub/sub ---
    /// Prefix of the MQTT client id; the MAC is appended.
    pub client_id_prefix: heapless::String<8>,
    pub mqtt_host: heapless::String<64>,
    pub mqtt_port: u16,

    // --- Messaging ---
    pub chat_id: heapless::String<24>,
}

impl Default for StackConfig {
    fn default() -> Self {
        let mut ntp_servers = heapless::Vec::new();
        for server in ["nl.pool.ntp.org", "pool.ntp.org"] {
            let _ = ntp_servers.push(fixed(server));
        }
        Self {
            services: ServiceSet::from(ServiceKind::Link) | ServiceKind::TimeSync,

            clock_sync_threshold_secs: DEFAULT_CLOCK_SYNC_THRESHOLD_SECS,
            poll_interval_ms: 500,

            ntp_servers,
            timezone: fixed("CET-1CEST,M3.5.0,M10.5.0/3"),

            client_id_prefix: fixed("ESP-"),
            mqtt_host: heapless::String::new(),
            mqtt_port: 1883,

            chat_id: heapless::String::new(),
        }
    }
}

impl StackConfig {
    /// Parse a JSON provisioning blob and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed configuration JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Requested services plus everything they depend on.
    pub fn effective_services(&self) -> ServiceSet {
        closure(self.services)
    }

    /// Reject combinations the stack cannot bring up.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be non-zero"));
        }
        if self.clock_sync_threshold_secs <= 0 {
            return Err(Error::Config("clock_sync_threshold_secs must be positive"));
        }
        let effective = self.effective_services();
        if effective.contains(ServiceKind::TimeSync) && self.ntp_servers.is_empty() {
            return Err(Error::Config("time sync requires at least one NTP server"));
        }
        if effective.contains(ServiceKind::PubSub) && self.mqtt_host.is_empty() {
            return Err(Error::Config("pub/sub requires mqtt_host"));
        }
        if effective.contains(ServiceKind::PubSub) && self.mqtt_port == 0 {
            return Err(Error::Config("pub/sub requires a non-zero mqtt_port"));
        }
        if effective.contains(ServiceKind::Messaging) && self.chat_id.is_empty() {
            return Err(Error::Config("messaging requires chat_id"));
        }
        Ok(())
    }

    /// NTP server names as plain string slices.
    pub fn ntp_server_names(&self) -> heapless::Vec<&str, MAX_NTP_SERVERS> {
        self.ntp_servers.iter().map(heapless::String::as_str).collect()
    }
}

/// Copy `s` into a fixed-capacity string, truncating at capacity.
fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
