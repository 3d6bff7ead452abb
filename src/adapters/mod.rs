//! Adapters — concrete implementations of the collaborator port traits.
//!
//! | Adapter     | Implements              | Connects to                 |
//! |-------------|-------------------------|-----------------------------|
//! | `wifi`      | LinkDriver              | ESP-IDF WiFi STA            |
//! | `sntp`      | ClockSource             | ESP-IDF SNTP + system clock |
//! | `tls`       | SecureTransportProvider | esp-tls global CA store     |
//! | `mqtt`      | PubSubClient            | ESP-IDF MQTT client         |
//! | `telegram`  | MessagingClient         | Telegram Bot API over HTTPS |
//! | `device_id` | —                       | eFuse factory MAC           |
//!
//! Every adapter compiles on the host as a simulation, so the stack can be
//! exercised end-to-end without hardware.

pub mod device_id;
pub mod mqtt;
pub mod sntp;
pub mod telegram;
pub mod tls;
pub mod wifi;

use crate::app::service::Collaborators;

/// The production collaborator set.
pub type DeviceCollaborators = Collaborators<
    wifi::WifiLink,
    sntp::SntpClock,
    tls::TlsConfigurator,
    mqtt::MqttSession,
    telegram::TelegramBot,
>;
