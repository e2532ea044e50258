//! Status, dispensing and error LEDs.
//!
//! Three discrete LEDs on plain GPIO outputs.  The driver mirrors the
//! commanded levels in memory so host tests can observe them.

use crate::drivers::hw_init;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// WiFi link health.
    Status,
    /// Transaction in progress.
    Dispensing,
    /// Flashed with the error tone.
    Error,
}

impl Indicator {
    fn gpio(self) -> i32 {
        match self {
            Self::Status => pins::STATUS_LED_GPIO,
            Self::Dispensing => pins::DISPENSING_LED_GPIO,
            Self::Error => pins::ERROR_LED_GPIO,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
pub struct Indicators {
    lit: [bool; 3],
}

impl Indicators {
    pub fn new() -> Self {
        let mut leds = Self::default();
        for led in [Indicator::Status, Indicator::Dispensing, Indicator::Error] {
            leds.set(led, false);
        }
        leds
    }

    pub fn set(&mut self, led: Indicator, on: bool) {
        hw_init::gpio_write(led.gpio(), on);
        self.lit[led.index()] = on;
    }

    pub fn is_on(&self, led: Indicator) -> bool {
        self.lit[led.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_dark() {
        let leds = Indicators::new();
        assert!(!leds.is_on(Indicator::Status));
        assert!(!leds.is_on(Indicator::Dispensing));
        assert!(!leds.is_on(Indicator::Error));
    }

    #[test]
    fn set_tracks_each_led() {
        let mut leds = Indicators::new();
        leds.set(Indicator::Dispensing, true);
        assert!(leds.is_on(Indicator::Dispensing));
        assert!(!leds.is_on(Indicator::Error));
        leds.set(Indicator::Dispensing, false);
        assert!(!leds.is_on(Indicator::Dispensing));
    }
}
