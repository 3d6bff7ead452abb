//! netstage firmware — main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Adapters (outer ring)                    │
//! │  WifiLink   SntpClock   TlsConfigurator                  │
//! │  MqttSession            TelegramBot                      │
//! │                                                          │
//! │  ─────────────── Port Trait Boundary ───────────────     │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────┐      │
//! │  │  ConnectivityStack (state table · cascade)     │      │
//! │  └────────────────────────────────────────────────┘      │
//! │                                                          │
//! │  System event loop ──▶ EventIngress      main loop ─▶ tick│
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Provisioning is compiled in: `NETSTAGE_CONFIG` (JSON, optional),
//! `WIFI_SSID`, `WIFI_PASS` and `TELEGRAM_TOKEN`.
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{EspWifi, WifiEvent};

use netstage::adapters::device_id;
use netstage::adapters::mqtt::MqttSession;
use netstage::adapters::sntp::SntpClock;
use netstage::adapters::telegram::TelegramBot;
use netstage::adapters::tls::TlsConfigurator;
use netstage::adapters::wifi::WifiLink;
use netstage::app::credentials::Credentials;
use netstage::app::ports::MessageFormat;
use netstage::config::StackConfig;
use netstage::events::LinkEvent;
use netstage::{Collaborators, ConnectivityStack, ServiceKind};

const COMMAND_TOPIC: &str = "netstage/cmd";

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("netstage v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let config = match option_env!("NETSTAGE_CONFIG") {
        Some(json) => StackConfig::from_json(json)?,
        None => StackConfig::default(),
    };
    config.validate()?;
    let credentials = Credentials::new(
        option_env!("WIFI_SSID").unwrap_or_default(),
        option_env!("WIFI_PASS").unwrap_or_default(),
    )
    .map_err(netstage::error::Error::from)?;
    let client_id = device_id::client_id(&config.client_id_prefix, &device_id::read_mac());
    info!("Device client id: {}", client_id);

    // ── 3. Peripherals & collaborators ────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let wifi = EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?;

    let io = Collaborators {
        link: WifiLink::new(wifi),
        clock: SntpClock::new(),
        secure: TlsConfigurator::new(),
        pubsub: MqttSession::new(&config.mqtt_host, config.mqtt_port).with_handler(Arc::new(
            |topic: &str, payload: &[u8]| info!("MQTT <- {}: {} bytes", topic, payload.len()),
        )),
        messaging: TelegramBot::new(option_env!("TELEGRAM_TOKEN").unwrap_or_default()),
    };
    let poll_ms = config.poll_interval_ms;
    let mut stack = ConnectivityStack::new(config, credentials, &client_id, io)?;

    // ── 4. Link events → ingress ──────────────────────────────
    let wifi_ingress = stack.ingress();
    let _wifi_sub = sysloop.subscribe::<WifiEvent, _>(move |event| match event {
        WifiEvent::StaConnected(..) => wifi_ingress.dispatch(LinkEvent::StationConnected),
        WifiEvent::StaDisconnected(..) => wifi_ingress.dispatch(LinkEvent::StationDisconnected),
        _ => {}
    })?;
    let ip_ingress = stack.ingress();
    let _ip_sub = sysloop.subscribe::<IpEvent, _>(move |event| {
        if let IpEvent::DhcpIpAssigned(_) = event {
            ip_ingress.dispatch(LinkEvent::GotAddress);
        }
    })?;

    // ── 5. Bring-up ───────────────────────────────────────────
    if let Err(e) = stack.connect_link() {
        warn!("Initial connect failed: {}", e);
    }

    // ── 6. Tick loop ──────────────────────────────────────────
    let mut announced = false;
    let mut subscribed = false;
    loop {
        let report = stack.tick();
        if !report.is_quiet() {
            info!("Tick {}: {}", stack.tick_count(), stack.status());
        }

        // Retry the link if it dropped or never came up.
        if stack.current_state(ServiceKind::Link) == netstage::ServiceState::Inactive {
            if let Err(e) = stack.connect_link() {
                warn!("Reconnect failed: {}", e);
            }
        }

        if stack.is_ready_to_publish() && !subscribed {
            match stack.subscribe(COMMAND_TOPIC) {
                Ok(()) => subscribed = true,
                Err(e) => warn!("Subscribe {}: {}", COMMAND_TOPIC, e),
            }
        } else if !stack.is_ready_to_publish() {
            subscribed = false;
        }

        if stack.is_ready_to_send() && !announced {
            match stack.send_message("netstage online", MessageFormat::Plain) {
                Ok(()) => announced = true,
                Err(e) => warn!("Boot message: {}", e),
            }
        }

        FreeRtos::delay_ms(poll_ms);
    }
}
