//! Slot servo bank: the physical dispensing mechanism.
//!
//! Each slot has a hobby servo that pushes one unit out when swung from
//! home (0°) to the dispense angle (90°) and back, and an optional IR
//! break-beam sensor that pulls LOW when a unit falls past it.
//!
//! One dispense cycle:
//!
//! ```text
//!  90° ── hold 500 ms ──▶ 0° ── settle 1000 ms ──▶ sample IR ── 500 ms
//! ```
//!
//! The durations are mechanical constants of the hopper, not
//! configuration.  All waits go through an `embedded-hal` [`DelayNs`], so
//! host tests substitute a recording delay and run instantly.

use embedded_hal::delay::DelayNs;
use log::{error, info};

use crate::app::ports::{Detection, SlotActuatorPort};
use crate::drivers::hw_init;
use crate::inventory::SLOT_COUNT;
use crate::pins::{self, SLOTS};

pub const HOME_ANGLE: u8 = 0;
pub const DISPENSE_ANGLE: u8 = 90;

/// Time the servo is held at the dispense angle.
pub const DISPENSE_HOLD_MS: u32 = 500;
/// Settle time after returning home, before the IR sample.
pub const RETURN_SETTLE_MS: u32 = 1000;
/// Pause after the IR sample, before the next unit.
pub const POST_UNIT_PAUSE_MS: u32 = 500;
/// Pause separating two distinct items of one request.
pub const INTER_ITEM_PAUSE_MS: u32 = 1000;

/// Time given to each servo to reach home during [`ServoBank::home_all`].
pub const HOME_STEP_MS: u32 = 100;

/// Total blocking time of one [`ServoBank::dispense_unit`] call.
pub const UNIT_CYCLE_MS: u32 = DISPENSE_HOLD_MS + RETURN_SETTLE_MS + POST_UNIT_PAUSE_MS;

/// LEDC duty for `angle` at the configured resolution and 50 Hz period.
pub fn angle_to_duty(angle: u8) -> u32 {
    let angle = u32::from(angle.min(180));
    let span = pins::SERVO_MAX_PULSE_US - pins::SERVO_MIN_PULSE_US;
    let pulse_us = pins::SERVO_MIN_PULSE_US + span * angle / 180;
    let period_us = 1_000_000 / pins::SERVO_PWM_FREQ_HZ;
    let full_scale = 1u32 << pins::SERVO_PWM_RESOLUTION_BITS;
    pulse_us * full_scale / period_us
}

/// Drives the slot servos through one shared PWM channel.
pub struct ServoBank<D: DelayNs> {
    delay: D,
    /// Slot currently routed to the PWM channel.
    attached: Option<usize>,
    /// Last commanded angle per slot.
    angles: [u8; SLOT_COUNT],
}

impl<D: DelayNs> ServoBank<D> {
    pub fn new(delay: D) -> Self {
        Self {
            delay,
            attached: None,
            angles: [HOME_ANGLE; SLOT_COUNT],
        }
    }

    /// Drive every servo to home, one at a time.
    pub fn home_all(&mut self) {
        for slot in 0..SLOT_COUNT {
            self.write_angle(slot, HOME_ANGLE);
            self.delay.delay_ms(HOME_STEP_MS);
        }
        info!("ServoBank: {} servos homed", SLOT_COUNT);
    }

    pub fn angle(&self, slot: usize) -> Option<u8> {
        self.angles.get(slot).copied()
    }

    /// Read the slot's IR sensor.  Slots without one never confirm.
    pub fn sample_detection(slot: usize) -> Detection {
        match SLOTS.get(slot).and_then(|p| p.ir_gpio) {
            Some(gpio) if !hw_init::gpio_read(gpio) => Detection::Detected,
            _ => Detection::NotDetected,
        }
    }

    fn write_angle(&mut self, slot: usize, angle: u8) {
        let Some(wiring) = SLOTS.get(slot) else {
            return;
        };
        let duty = angle_to_duty(angle);

        if self.attached != Some(slot) {
            if let Some(prev) = self.attached.take() {
                hw_init::servo_detach(SLOTS[prev].servo_gpio);
            }
            if let Err(e) = hw_init::servo_attach(wiring.servo_gpio, duty) {
                error!("ServoBank: slot {} (GPIO {}): {}", slot + 1, wiring.servo_gpio, e);
                return;
            }
            self.attached = Some(slot);
        }

        hw_init::servo_set_duty(duty);
        self.angles[slot] = angle;
    }
}

impl<D: DelayNs> SlotActuatorPort for ServoBank<D> {
    fn dispense_unit(&mut self, slot: usize) -> Detection {
        info!("ServoBank: dispensing one unit from slot {}", slot + 1);
        self.write_angle(slot, DISPENSE_ANGLE);
        self.delay.delay_ms(DISPENSE_HOLD_MS);
        self.write_angle(slot, HOME_ANGLE);
        self.delay.delay_ms(RETURN_SETTLE_MS);

        let detection = Self::sample_detection(slot);
        if detection == Detection::Detected {
            info!("ServoBank: slot {} unit detected", slot + 1);
        }

        self.delay.delay_ms(POST_UNIT_PAUSE_MS);
        detection
    }

    fn inter_item_pause(&mut self) {
        self.delay.delay_ms(INTER_ITEM_PAUSE_MS);
    }
}
