//! Task Watchdog Timer (TWDT) driver.
//!
//! Subscribes the control-loop task to the ESP-IDF TWDT.  The loop feeds
//! it once per iteration.  The longest legitimate stall is a WiFi
//! reconnect attempt from the system monitor, which must finish inside
//! [`TWDT_TIMEOUT_MS`].
//!
//! Unrelated to the dispense watchdog, which lives in the state machine.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub const TWDT_TIMEOUT_MS: u32 = 30_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            let cfg = esp_task_wdt_config_t {
                timeout_ms: TWDT_TIMEOUT_MS,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            // SAFETY: plain FFI calls with a valid config; the null task
            // handle means "the calling task".
            let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
            if ret != ESP_OK {
                log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
            }
            let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
            let subscribed = ret == ESP_OK;
            if subscribed {
                log::info!("Watchdog: control loop subscribed ({} ms)", TWDT_TIMEOUT_MS);
            } else {
                log::warn!("Watchdog: failed to subscribe ({})", ret);
            }
            Self { subscribed }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): no-op");
            Self {}
        }
    }

    pub fn feed(&mut self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: resets the TWDT entry of the calling (subscribed) task.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }
}
