//! Monotonic clock and blocking delay.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for time, FreeRTOS
//!   task delay (or a busy-wait below one tick) for sleeping.
//! - **host**: `std::time::Instant` and `std::thread::sleep`.

use embedded_hal::delay::DelayNs;

/// Milliseconds since boot (host: since construction).
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    #[cfg(target_os = "espidf")]
    pub fn now_ms(&self) -> u64 {
        // SAFETY: reads the monotonic high-resolution timer.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Blocking delay that yields the calling task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskDelay;

impl DelayNs for TaskDelay {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        use esp_idf_svc::hal::delay::{Ets, FreeRtos};
        if ns >= 1_000_000 {
            FreeRtos::delay_ms(ns / 1_000_000);
        } else {
            Ets::delay_us(ns.div_ceil(1_000));
        }
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
