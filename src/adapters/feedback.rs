//! Buzzer + LED feedback adapter.
//!
//! Implements [`NotifierPort`].  Each notice maps to a fixed beep pattern
//! and indicator change:
//!
//! | Notice                  | LEDs                         | Buzzer            |
//! |-------------------------|------------------------------|-------------------|
//! | `Startup`               | none                         | 3 × 100 ms        |
//! | `Started`               | dispensing on                | 500 ms            |
//! | `UnitDispensed` (seen)  | none                         | 200 ms            |
//! | `UnitDispensed` (unseen)| none                         | silent            |
//! | `Completed`             | dispensing off               | 2 × 300 ms        |
//! | `Error`                 | dispensing off, error flash  | 5 × 100 ms        |

use embedded_hal::delay::DelayNs;
use log::warn;

use crate::app::events::Notice;
use crate::app::ports::NotifierPort;
use crate::drivers::buzzer::{BeepPattern, Buzzer};
use crate::drivers::indicators::{Indicator, Indicators};

/// Extra time the error LED stays lit after the error tone.
pub const ERROR_LED_TAIL_MS: u32 = 100;

pub struct FeedbackAdapter<D: DelayNs> {
    buzzer: Buzzer,
    leds: Indicators,
    delay: D,
}

impl<D: DelayNs> FeedbackAdapter<D> {
    pub fn new(buzzer: Buzzer, leds: Indicators, delay: D) -> Self {
        Self { buzzer, leds, delay }
    }

    pub fn indicators(&self) -> &Indicators {
        &self.leds
    }

    /// The system monitor drives the status LED through this.
    pub fn indicators_mut(&mut self) -> &mut Indicators {
        &mut self.leds
    }

    pub fn beep_count(&self) -> u32 {
        self.buzzer.beep_count()
    }
}

impl<D: DelayNs> NotifierPort for FeedbackAdapter<D> {
    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::Startup => self.buzzer.play(BeepPattern::STARTUP, &mut self.delay),
            Notice::Started => {
                self.leds.set(Indicator::Dispensing, true);
                self.buzzer.play(BeepPattern::DISPENSE_START, &mut self.delay);
            }
            Notice::UnitDispensed { slot, confirmed } => {
                if confirmed {
                    self.buzzer.play(BeepPattern::UNIT_DISPENSED, &mut self.delay);
                } else {
                    warn!("Feedback: slot {} unit not confirmed", slot + 1);
                }
            }
            Notice::Completed => {
                self.leds.set(Indicator::Dispensing, false);
                self.buzzer.play(BeepPattern::COMPLETE, &mut self.delay);
            }
            Notice::Error => {
                self.leds.set(Indicator::Dispensing, false);
                self.leds.set(Indicator::Error, true);
                self.buzzer.play(BeepPattern::ERROR, &mut self.delay);
                self.delay.delay_ms(ERROR_LED_TAIL_MS);
                self.leds.set(Indicator::Error, false);
            }
        }
    }
}
