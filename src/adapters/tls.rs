//! TLS trust-anchor configurator.
//!
//! Implements [`SecureTransportProvider`].  The anchor arrives as PEM
//! text; it is checked for certificate framing and a base64 body, then
//! copied NUL-terminated (mbedTLS parses PEM only with a trailing NUL).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: installs the anchor as the esp-tls global
//!   CA store, used by every outbound HTTPS/MQTTS connection.
//! - **all other targets**: keeps the anchor and simulates a TLS session
//!   so session-cache handling can be tested on the host.

use log::{info, warn};

use crate::app::ports::{SecureTransportProvider, SessionCache};

/// Maximum anchor size (PEM, including the NUL terminator).
pub const MAX_ANCHOR_SIZE: usize = 4096;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

#[cfg(not(target_os = "espidf"))]
const SIM_SESSION_TICKET: &[u8] = b"sim-tls13-ticket";

/// Why an anchor was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorError {
    TooLarge,
    NotUtf8,
    MissingBegin,
    MissingEnd,
    EmptyBody,
    BadBase64,
}

impl core::fmt::Display for AnchorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooLarge => write!(f, "anchor exceeds {MAX_ANCHOR_SIZE} bytes"),
            Self::NotUtf8 => write!(f, "anchor is not text"),
            Self::MissingBegin => write!(f, "missing BEGIN CERTIFICATE line"),
            Self::MissingEnd => write!(f, "missing END CERTIFICATE line"),
            Self::EmptyBody => write!(f, "certificate body is empty"),
            Self::BadBase64 => write!(f, "certificate body is not base64"),
        }
    }
}

/// Check that `pem` holds at least one well-framed certificate.
pub fn validate_pem(pem: &[u8]) -> Result<(), AnchorError> {
    if pem.len() >= MAX_ANCHOR_SIZE {
        return Err(AnchorError::TooLarge);
    }
    let text = core::str::from_utf8(pem).map_err(|_| AnchorError::NotUtf8)?;
    let text = text.trim_end_matches('\0');
    let mut rest = text.trim_start();
    let mut blocks = 0;
    while !rest.is_empty() {
        let body = rest
            .strip_prefix(PEM_BEGIN)
            .ok_or(AnchorError::MissingBegin)?;
        let end = body.find(PEM_END).ok_or(AnchorError::MissingEnd)?;
        let b64 = &body[..end];
        if b64.trim().is_empty() {
            return Err(AnchorError::EmptyBody);
        }
        let base64 = |c: char| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=');
        if !b64.chars().all(|c| c.is_ascii_whitespace() || base64(c)) {
            return Err(AnchorError::BadBase64);
        }
        blocks += 1;
        rest = body[end + PEM_END.len()..].trim_start();
    }
    if blocks == 0 {
        return Err(AnchorError::MissingBegin);
    }
    Ok(())
}

pub struct TlsConfigurator {
    anchor: heapless::Vec<u8, MAX_ANCHOR_SIZE>,
    configured: u32,
    resumed: u32,
}

impl Default for TlsConfigurator {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsConfigurator {
    pub fn new() -> Self {
        Self {
            anchor: heapless::Vec::new(),
            configured: 0,
            resumed: 0,
        }
    }

    /// Installed anchor, without the NUL terminator.
    pub fn anchor(&self) -> &[u8] {
        self.anchor.strip_suffix(&[0]).unwrap_or(self.anchor.as_slice())
    }

    /// Successful `configure` calls.
    pub fn configured(&self) -> u32 {
        self.configured
    }

    /// `configure` calls that found a cached session.
    pub fn resumed(&self) -> u32 {
        self.resumed
    }

    fn load(&mut self, pem: &[u8]) -> Result<(), AnchorError> {
        validate_pem(pem)?;
        self.anchor.clear();
        self.anchor
            .extend_from_slice(pem)
            .map_err(|_| AnchorError::TooLarge)?;
        if self.anchor.last() != Some(&0) {
            self.anchor.push(0).map_err(|_| AnchorError::TooLarge)?;
        }
        Ok(())
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_install(&mut self, _session: &mut SessionCache) -> bool {
        let len = match u32::try_from(self.anchor.len()) {
            Ok(len) => len,
            Err(_) => return false,
        };
        // SAFETY: esp-tls copies the buffer; it only needs to be valid for
        // the duration of the call.
        let installed = esp_idf_svc::sys::esp!(unsafe {
            esp_idf_svc::sys::esp_tls_set_global_ca_store(self.anchor.as_ptr(), len)
        });
        if let Err(e) = installed {
            warn!("TLS(espidf): set_global_ca_store failed: {}", e);
            return false;
        }
        true
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_install(&mut self, session: &mut SessionCache) -> bool {
        if session.is_empty() {
            session.store(SIM_SESSION_TICKET);
        }
        true
    }
}

impl SecureTransportProvider for TlsConfigurator {
    fn configure(&mut self, trust_anchor: &[u8], session_cache: &mut SessionCache) -> bool {
        if let Err(e) = self.load(trust_anchor) {
            warn!("TLS: trust anchor rejected: {}", e);
            return false;
        }
        let resuming = !session_cache.is_empty();
        if !self.platform_install(session_cache) {
            return false;
        }
        if resuming {
            self.resumed += 1;
        }
        self.configured += 1;
        info!(
            "TLS: trust anchor installed ({}B){}",
            self.anchor.len(),
            if resuming { ", resuming session" } else { "" }
        );
        true
    }
}
