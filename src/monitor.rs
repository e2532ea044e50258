//! Periodic system health check.
//!
//! Runs from the control loop every `monitor_interval_secs`:
//!
//! 1. WiFi down → status LED off, one reconnect attempt.
//! 2. WiFi up → status LED on.
//! 3. Free heap below `low_heap_warning_bytes` → warning.
//!
//! A check never touches dispensing state; a reconnect attempt blocks the
//! loop like any other step.

use log::{info, warn};

use crate::app::ports::ConnectivityPort;
use crate::config::SystemConfig;
use crate::drivers::indicators::{Indicator, Indicators};

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorReport {
    /// Link state after any reconnect attempt.
    pub wifi_connected: bool,
    pub reconnect_attempted: bool,
    pub free_heap: u32,
    pub low_heap: bool,
}

pub struct SystemMonitor {
    interval_ms: u64,
    low_heap_bytes: u32,
    last_check_ms: u64,
    checks: u32,
}

impl SystemMonitor {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            interval_ms: u64::from(config.monitor_interval_secs) * 1000,
            low_heap_bytes: config.low_heap_warning_bytes,
            last_check_ms: 0,
            checks: 0,
        }
    }

    /// Run a check if the interval has elapsed since the previous one.
    pub fn poll(
        &mut self,
        now_ms: u64,
        free_heap: u32,
        wifi: &mut impl ConnectivityPort,
        leds: &mut Indicators,
    ) -> Option<MonitorReport> {
        if now_ms.saturating_sub(self.last_check_ms) < self.interval_ms {
            return None;
        }
        self.last_check_ms = now_ms;
        self.checks = self.checks.wrapping_add(1);
        Some(self.check(free_heap, wifi, leds))
    }

    pub fn checks(&self) -> u32 {
        self.checks
    }

    fn check(
        &self,
        free_heap: u32,
        wifi: &mut impl ConnectivityPort,
        leds: &mut Indicators,
    ) -> MonitorReport {
        let mut reconnect_attempted = false;
        let wifi_connected = if wifi.is_connected() {
            true
        } else {
            leds.set(Indicator::Status, false);
            reconnect_attempted = true;
            match wifi.reconnect() {
                Ok(()) => {
                    info!("Monitor: WiFi restored");
                    true
                }
                Err(e) => {
                    warn!("Monitor: WiFi still down ({})", e);
                    false
                }
            }
        };
        leds.set(Indicator::Status, wifi_connected);

        let low_heap = free_heap < self.low_heap_bytes;
        if low_heap {
            warn!("Monitor: low memory, {} bytes free", free_heap);
        }

        MonitorReport {
            wifi_connected,
            reconnect_attempted,
            free_heap,
            low_heap,
        }
    }
}
