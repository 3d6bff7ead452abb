//! Device identity derived from the ESP32 factory MAC address.
//!
//! The pub/sub client id is the configured prefix followed by all six MAC
//! bytes in uppercase hex, e.g. `ESP-DEADBEEFCAFE`.  Deterministic across
//! reboots (factory-burned eFuse MAC).

use core::fmt::Write;

use crate::app::service::CLIENT_ID_MAX;

pub type ClientIdString = heapless::String<CLIENT_ID_MAX>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the six bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// `<prefix><12 hex digits>`.  A prefix too long to fit is truncated.
pub fn client_id(prefix: &str, mac: &MacAddress) -> ClientIdString {
    let mut id = ClientIdString::new();
    for c in prefix.chars().take(CLIENT_ID_MAX - 2 * mac.len()) {
        let _ = id.push(c);
    }
    for b in mac {
        let _ = write!(id, "{b:02X}");
    }
    id
}
