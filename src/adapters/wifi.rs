//! WiFi station-mode adapter.
//!
//! Implements [`LinkDriver`].  Connection progress (associated, got
//! address, lost) is reported by the platform event loop, which `main`
//! forwards to the stack's [`EventIngress`](crate::events::EventIngress);
//! this adapter only issues requests.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.

use log::{info, warn};

use crate::app::credentials::Credentials;
use crate::app::ports::{LinkDriver, LinkError, RadioPower};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

pub struct WifiLink {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,

    // ── Simulation fields ───────────────────────────────────────
    /// Polls left before the simulated radio reports `On`.
    #[cfg(not(target_os = "espidf"))]
    power_up_polls: u8,
    #[cfg(not(target_os = "espidf"))]
    fail_next: bool,
    #[cfg(not(target_os = "espidf"))]
    associated: bool,

    attempts: u32,
}

impl WifiLink {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self { wifi, attempts: 0 }
    }

    /// Simulated radio that needs `power_up_polls` polls to wake.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(power_up_polls: u8) -> Self {
        Self {
            power_up_polls,
            fail_next: false,
            associated: false,
            attempts: 0,
        }
    }

    /// Connect requests issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Simulation: the next connect request is refused.
    #[cfg(not(target_os = "espidf"))]
    pub fn fail_next_connect(&mut self) {
        self.fail_next = true;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn is_associated(&self) -> bool {
        self.associated
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        let auth_method = if credentials.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid()
                .try_into()
                .map_err(|_| LinkError::InvalidSsid)?,
            password: credentials
                .password()
                .try_into()
                .map_err(|_| LinkError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        self.wifi
            .set_configuration(&config)
            .map_err(|_| LinkError::ConnectionFailed)?;
        self.wifi.connect().map_err(|e| {
            warn!("WiFi(espidf): connect request failed: {}", e);
            LinkError::ConnectionFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        if self.power_up_polls > 0 {
            return Err(LinkError::RadioOff);
        }
        if core::mem::take(&mut self.fail_next) {
            warn!("WiFi(sim): simulated refusal (attempt {})", self.attempts);
            return Err(LinkError::ConnectionFailed);
        }
        self.associated = true;
        info!("WiFi(sim): joining '{}'", credentials.ssid());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi(espidf): disconnect failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.associated = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_poll_power(&mut self) -> RadioPower {
        match self.wifi.is_started() {
            Ok(true) => RadioPower::On,
            Ok(false) => {
                if let Err(e) = self.wifi.start() {
                    warn!("WiFi(espidf): start failed: {}", e);
                    return RadioPower::Off;
                }
                RadioPower::Transitioning
            }
            Err(_) => RadioPower::Off,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_poll_power(&mut self) -> RadioPower {
        if self.power_up_polls == 0 {
            return RadioPower::On;
        }
        self.power_up_polls -= 1;
        RadioPower::Transitioning
    }
}

// ───────────────────────────────────────────────────────────────
// LinkDriver
// ───────────────────────────────────────────────────────────────

impl LinkDriver for WifiLink {
    fn connect(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        self.attempts = self.attempts.wrapping_add(1);
        info!(
            "WiFi: connecting to '{}' (attempt {})",
            credentials.ssid(),
            self.attempts
        );
        self.platform_connect(credentials)
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        info!("WiFi: disconnected");
    }

    fn poll_power(&mut self) -> RadioPower {
        self.platform_poll_power()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
