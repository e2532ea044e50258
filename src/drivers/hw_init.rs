//! One-shot hardware peripheral initialization plus the raw GPIO / LEDC
//! accessors the drivers build on.
//!
//! Configures GPIO directions and the servo LEDC timer using raw ESP-IDF
//! sys calls.  Called once from `main()` before the control loop starts.
//! Off-target every accessor is a no-op (reads return HIGH, the idle level
//! of the active-low IR sensors).

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={rc})"),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={rc})"),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(e: HwInitError) -> Self {
        Self::Init(e)
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> crate::error::Result<()> {
    // SAFETY: called once from main() before the control loop; single-threaded.
    unsafe {
        init_gpio_inputs()?;
        init_gpio_outputs()?;
        init_servo_timer()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> crate::error::Result<()> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    for ir in pins::SLOTS.iter().filter_map(|s| s.ir_gpio) {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << ir,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }
    info!("hw_init: IR sensor inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: register read on an already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let output_pins = [
        pins::STATUS_LED_GPIO,
        pins::DISPENSING_LED_GPIO,
        pins::ERROR_LED_GPIO,
        pins::BUZZER_GPIO,
    ];

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: LED and buzzer outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: write to an output pin configured in init_gpio_outputs().
    // Main-loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── Servo LEDC ────────────────────────────────────────────────
//
// Only one servo moves at a time, so a single LEDC channel is routed to
// whichever slot is being driven.

#[cfg(target_os = "espidf")]
const SERVO_TIMER: ledc_timer_t = ledc_timer_t_LEDC_TIMER_0;
#[cfg(target_os = "espidf")]
const SERVO_CHANNEL: ledc_channel_t = ledc_channel_t_LEDC_CHANNEL_0;

#[cfg(target_os = "espidf")]
unsafe fn init_servo_timer() -> Result<(), HwInitError> {
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: SERVO_TIMER,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_14_BIT,
        freq_hz: pins::SERVO_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK {
        return Err(HwInitError::LedcInitFailed(ret));
    }
    info!("hw_init: servo LEDC timer at {} Hz", pins::SERVO_PWM_FREQ_HZ);
    Ok(())
}

/// Route the servo PWM channel to `gpio`, starting at `duty`.
#[cfg(target_os = "espidf")]
pub fn servo_attach(gpio: i32, duty: u32) -> Result<(), HwInitError> {
    // SAFETY: the timer was configured in init_servo_timer(); main-loop only.
    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: SERVO_CHANNEL,
            timer_sel: SERVO_TIMER,
            gpio_num: gpio,
            duty,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK {
        return Err(HwInitError::LedcInitFailed(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn servo_attach(_gpio: i32, _duty: u32) -> Result<(), HwInitError> {
    Ok(())
}

/// Release `gpio` from the servo channel, leaving it low.
#[cfg(target_os = "espidf")]
pub fn servo_detach(gpio: i32) {
    // SAFETY: resetting a pin we previously routed; main-loop only.
    unsafe {
        gpio_reset_pin(gpio);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn servo_detach(_gpio: i32) {}

#[cfg(target_os = "espidf")]
pub fn servo_set_duty(duty: u32) {
    // SAFETY: channel configured by servo_attach(); only the main loop
    // writes the duty register.
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, SERVO_CHANNEL, duty);
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, SERVO_CHANNEL);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn servo_set_duty(_duty: u32) {}
