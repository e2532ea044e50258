//! Active buzzer driver and the fixed beep patterns.
//!
//! The buzzer is a plain digital output; a pattern is a list of
//! on/off durations played back-to-back through a [`DelayNs`].  Playing a
//! pattern blocks the caller for [`BeepPattern::duration_ms`].

use embedded_hal::delay::DelayNs;

use crate::drivers::hw_init;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beep {
    pub on_ms: u32,
    pub off_ms: u32,
}

const fn beep(on_ms: u32, off_ms: u32) -> Beep {
    Beep { on_ms, off_ms }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeepPattern(pub &'static [Beep]);

impl BeepPattern {
    pub const STARTUP: Self = Self(&[beep(100, 100), beep(100, 100), beep(100, 100)]);
    pub const DISPENSE_START: Self = Self(&[beep(500, 0)]);
    pub const UNIT_DISPENSED: Self = Self(&[beep(200, 0)]);
    pub const COMPLETE: Self = Self(&[beep(300, 200), beep(300, 200)]);
    pub const ERROR: Self = Self(&[
        beep(100, 100),
        beep(100, 100),
        beep(100, 100),
        beep(100, 100),
        beep(100, 100),
    ]);

    pub fn duration_ms(&self) -> u32 {
        self.0.iter().map(|b| b.on_ms + b.off_ms).sum()
    }
}

pub struct Buzzer {
    gpio: i32,
    beeps: u32,
}

impl Default for Buzzer {
    fn default() -> Self {
        Self::new(pins::BUZZER_GPIO)
    }
}

impl Buzzer {
    pub fn new(gpio: i32) -> Self {
        hw_init::gpio_write(gpio, false);
        Self { gpio, beeps: 0 }
    }

    pub fn play(&mut self, pattern: BeepPattern, delay: &mut impl DelayNs) {
        for b in pattern.0 {
            hw_init::gpio_write(self.gpio, true);
            delay.delay_ms(b.on_ms);
            hw_init::gpio_write(self.gpio, false);
            if b.off_ms > 0 {
                delay.delay_ms(b.off_ms);
            }
            self.beeps = self.beeps.wrapping_add(1);
        }
    }

    /// Beeps sounded since construction.
    pub fn beep_count(&self) -> u32 {
        self.beeps
    }
}
