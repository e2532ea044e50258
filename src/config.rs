//! System configuration parameters
//!
//! All tunable parameters for the dispenser.  Values are persisted with
//! postcard under `dispenser/syscfg`; a missing record means defaults.
//! Mechanical timings (servo holds, inter-item pause) are deliberately not
//! here: they are properties of the hardware, see `drivers::servo`.

use heapless::String;
use serde::{Deserialize, Serialize};

pub const WIFI_SSID_MAX: usize = 32;
pub const WIFI_PASSWORD_MAX: usize = 64;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Dispensing ---
    /// Hard ceiling on one transaction's wall-clock duration (milliseconds)
    pub dispense_timeout_ms: u64,

    // --- Timing ---
    /// Control loop sleep between iterations (milliseconds)
    pub control_loop_interval_ms: u32,
    /// System monitor period (seconds)
    pub monitor_interval_secs: u32,

    // --- Health ---
    /// Free-heap level below which the monitor logs a warning (bytes)
    pub low_heap_warning_bytes: u32,

    // --- Network ---
    pub http_port: u16,
    pub wifi_ssid: String<WIFI_SSID_MAX>,
    pub wifi_password: String<WIFI_PASSWORD_MAX>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            dispense_timeout_ms: 300_000, // 5 min

            control_loop_interval_ms: 10,
            monitor_interval_secs: 10,

            low_heap_warning_bytes: 10_000,

            http_port: 80,
            wifi_ssid: build_time_string(option_env!("DISPENSER_WIFI_SSID")),
            wifi_password: build_time_string(option_env!("DISPENSER_WIFI_PASSWORD")),
        }
    }
}

impl SystemConfig {
    pub fn has_wifi_credentials(&self) -> bool {
        !self.wifi_ssid.is_empty()
    }
}

/// Credentials baked in at build time; an over-long value is treated as
/// absent rather than truncated.
fn build_time_string<const N: usize>(value: Option<&str>) -> String<N> {
    value
        .and_then(|v| String::try_from(v).ok())
        .unwrap_or_default()
}
