//! netstage — staged connectivity bring-up for ESP32-class devices.
//!
//! Brings WiFi, SNTP, TLS, MQTT and a Telegram bot online in dependency
//! order, driven by asynchronous link events and a cooperative tick.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; every other target builds host simulations.

#![deny(unused_must_use)]

pub mod app;
pub mod catalog;
pub mod certs;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod resolver;
pub mod scheduler;

pub mod adapters;

pub use app::service::{Collaborators, ConnectivityStack};
pub use catalog::{ServiceKind, ServiceSet};
pub use fsm::ServiceState;
