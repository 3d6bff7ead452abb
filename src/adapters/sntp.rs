//! Wall clock set by SNTP.
//!
//! Implements [`ClockSource`].  Reading the clock is the same on both
//! targets (`SystemTime`); only starting the background sync differs.
//!
//! - **`target_os = "espidf"`** — `EspSntp` service plus a POSIX `TZ` rule.
//! - **`not(target_os = "espidf")`** — records the request; the simulated
//!   clock can be pinned with [`SntpClock::set_time`].

use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};

use crate::app::ports::ClockSource;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sntp::{EspSntp, SntpConf};

pub struct SntpClock {
    #[cfg(target_os = "espidf")]
    sntp: Option<EspSntp<'static>>,

    #[cfg(not(target_os = "espidf"))]
    pinned: Option<i64>,
    #[cfg(not(target_os = "espidf"))]
    servers: Vec<String>,
    #[cfg(not(target_os = "espidf"))]
    timezone: String,

    sync_requests: u32,
}

impl Default for SntpClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SntpClock {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            sntp: None,
            #[cfg(not(target_os = "espidf"))]
            pinned: None,
            #[cfg(not(target_os = "espidf"))]
            servers: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            timezone: String::new(),
            sync_requests: 0,
        }
    }

    pub fn sync_requests(&self) -> u32 {
        self.sync_requests
    }

    /// Simulation: fix the clock at `secs`; `None` follows the host clock.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_time(&mut self, secs: Option<i64>) {
        self.pinned = secs;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    fn system_now() -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            // Clock before 1970: treat as unsynchronised.
            Err(_) => 0,
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self, servers: &[&str], timezone: &str) {
        // SAFETY: TZ is only written from the tick task, before tzset.
        unsafe {
            std::env::set_var("TZ", timezone);
            esp_idf_svc::sys::tzset();
        }
        if self.sntp.is_some() {
            return;
        }
        let mut conf = SntpConf::default();
        for (slot, server) in conf.servers.iter_mut().zip(servers) {
            *slot = *server;
        }
        match EspSntp::new(&conf) {
            Ok(sntp) => self.sntp = Some(sntp),
            Err(e) => warn!("SNTP(espidf): start failed: {}", e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self, servers: &[&str], timezone: &str) {
        if servers.is_empty() {
            warn!("SNTP(sim): no servers configured");
        }
        self.servers = servers.iter().map(|s| (*s).to_owned()).collect();
        self.timezone = timezone.to_owned();
    }

    #[cfg(target_os = "espidf")]
    fn platform_now(&self) -> i64 {
        Self::system_now()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_now(&self) -> i64 {
        self.pinned.unwrap_or_else(Self::system_now)
    }
}

impl ClockSource for SntpClock {
    fn now(&self) -> i64 {
        self.platform_now()
    }

    fn start_sync(&mut self, servers: &[&str], timezone: &str) {
        self.sync_requests = self.sync_requests.wrapping_add(1);
        info!("SNTP: syncing via {:?} (TZ={})", servers, timezone);
        self.platform_start(servers, timezone);
    }
}
