//! Telegram bot messaging client.
//!
//! Implements [`MessagingClient`] as a `sendMessage` Bot API call.  The
//! JSON body is built with `serde_json`; `parse_mode` is omitted for plain
//! text.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: HTTPS POST through `EspHttpConnection`,
//!   verified against the global CA store installed by the TLS configurator.
//! - **all other targets**: appends the request body to an outbox.

use core::fmt::Write as _;

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::{MessageFormat, MessagingClient};

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::Method;
#[cfg(target_os = "espidf")]
use esp_idf_svc::io::Write as _;

pub const API_HOST: &str = "api.telegram.org";

pub type EndpointUrl = heapless::String<160>;

/// `sendMessage` request body.
#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
}

impl<'a> SendMessage<'a> {
    pub fn new(chat_id: &'a str, text: &'a str, format: MessageFormat) -> Self {
        Self {
            chat_id,
            text,
            parse_mode: format.parse_mode(),
        }
    }

    pub fn to_json(&self) -> Option<Vec<u8>> {
        serde_json::to_vec(self).ok()
    }
}

pub struct TelegramBot {
    endpoint: EndpointUrl,

    #[cfg(not(target_os = "espidf"))]
    outbox: Vec<Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    reject_next: bool,
}

impl TelegramBot {
    pub fn new(token: &str) -> Self {
        let mut endpoint = EndpointUrl::new();
        if write!(endpoint, "https://{API_HOST}/bot{token}/sendMessage").is_err() {
            warn!("Telegram: bot token too long, endpoint truncated");
        }
        Self {
            endpoint,
            #[cfg(not(target_os = "espidf"))]
            outbox: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            reject_next: false,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Simulation: request bodies sent so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn outbox(&self) -> &[Vec<u8>] {
        &self.outbox
    }

    /// Simulation: the API rejects the next message.
    #[cfg(not(target_os = "espidf"))]
    pub fn reject_next(&mut self) {
        self.reject_next = true;
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_post(&mut self, body: &[u8]) -> bool {
        let post = || -> Result<u16, esp_idf_svc::io::EspIOError> {
            let mut conn = EspHttpConnection::new(&Configuration {
                use_global_ca_store: true,
                ..Default::default()
            })?;
            let mut len = heapless::String::<8>::new();
            let _ = write!(len, "{}", body.len());
            let headers = [
                ("Content-Type", "application/json"),
                ("Content-Length", len.as_str()),
            ];
            conn.initiate_request(Method::Post, &self.endpoint, &headers)?;
            conn.write_all(body)?;
            conn.initiate_response()?;
            Ok(conn.status())
        };
        match post() {
            Ok(200) => true,
            Ok(status) => {
                warn!("Telegram(espidf): HTTP {}", status);
                false
            }
            Err(e) => {
                warn!("Telegram(espidf): request failed: {}", e);
                false
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_post(&mut self, body: &[u8]) -> bool {
        if core::mem::take(&mut self.reject_next) {
            return false;
        }
        self.outbox.push(body.to_vec());
        true
    }
}

impl MessagingClient for TelegramBot {
    fn send(&mut self, chat_id: &str, text: &str, format: MessageFormat) -> bool {
        let Some(body) = SendMessage::new(chat_id, text, format).to_json() else {
            warn!("Telegram: could not encode message");
            return false;
        };
        let delivered = self.platform_post(&body);
        if delivered {
            info!("Telegram: sent {}B to chat {}", text.len(), chat_id);
        }
        delivered
    }
}
