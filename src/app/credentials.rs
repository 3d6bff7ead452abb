//! WiFi station credentials.
//!
//! Held in fixed-capacity strings and validated on construction, so the
//! link driver never sees an SSID or passphrase the radio would reject.

use core::fmt;

use super::ports::LinkError;

pub const SSID_MAX: usize = 32;
pub const PASSWORD_MAX: usize = 64;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: heapless::String<SSID_MAX>,
    password: heapless::String<PASSWORD_MAX>,
}

impl Credentials {
    /// SSID: 1-32 printable ASCII bytes.  Password: empty (open network)
    /// or 8-64 bytes (WPA2).
    pub fn new(ssid: &str, password: &str) -> Result<Self, LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut out = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        out.ssid.push_str(ssid).map_err(|()| LinkError::InvalidSsid)?;
        out.password
            .push_str(password)
            .map_err(|()| LinkError::InvalidPassword)?;
        Ok(out)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > SSID_MAX || !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > PASSWORD_MAX {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}
