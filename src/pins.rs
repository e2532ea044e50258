//! GPIO pin assignments for the dispenser board (ESP32-WROOM).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

use crate::inventory::SLOT_COUNT;

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Wiring of one dispensing slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPins {
    /// Servo signal line (50 Hz PWM).
    pub servo_gpio: i32,
    /// IR break-beam sensor, active LOW.  `None` runs the slot unconfirmed.
    pub ir_gpio: Option<i32>,
}

const fn slot(servo_gpio: i32, ir_gpio: Option<i32>) -> SlotPins {
    SlotPins { servo_gpio, ir_gpio }
}

/// Slot `n` (0-based) is wired to `SLOTS[n]`.
///
/// GPIO 34/35 are input-only on the ESP32; slots 9 and 10 need a board
/// revision before their servos can move.  GPIO 1/3 carry the console
/// UART, so those two slots run without a detection sensor.
pub const SLOTS: [SlotPins; SLOT_COUNT] = [
    slot(13, Some(19)),
    slot(12, Some(21)),
    slot(14, Some(22)),
    slot(27, Some(23)),
    slot(26, Some(15)),
    slot(25, Some(16)),
    slot(33, Some(17)),
    slot(32, Some(0)),
    slot(35, None),
    slot(34, None),
];

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

/// On-board LED: solid while WiFi is up.
pub const STATUS_LED_GPIO: i32 = 2;
/// Lit for the duration of a transaction.
pub const DISPENSING_LED_GPIO: i32 = 4;
/// Flashed alongside the error tone.
pub const ERROR_LED_GPIO: i32 = 5;

/// Active buzzer, driven as a plain digital output.
pub const BUZZER_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Servo PWM
// ---------------------------------------------------------------------------

pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// LEDC duty resolution for the servo timer.  14 bits gives ~1.2 µs steps.
pub const SERVO_PWM_RESOLUTION_BITS: u32 = 14;
/// Pulse width at 0° (µs).
pub const SERVO_MIN_PULSE_US: u32 = 544;
/// Pulse width at 180° (µs).
pub const SERVO_MAX_PULSE_US: u32 = 2400;
