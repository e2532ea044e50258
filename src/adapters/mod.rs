//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements         | Connects to               |
//! |---------------|--------------------|---------------------------|
//! | `feedback`    | NotifierPort       | Buzzer + indicator LEDs   |
//! | `log_sink`    | EventSink          | Serial log output         |
//! | `nvs`         | ConfigPort         | NVS / in-memory store     |
//! |               | StoragePort        |                           |
//! | `wifi`        | ConnectivityPort   | ESP-IDF WiFi STA          |
//! | `time`        | `DelayNs`          | FreeRTOS delay, esp_timer |
//! | `system`      |                    | Heap stats, restart       |
//! | `http_server` |                    | ESP-IDF httpd (device)    |
//!
//! The slot actuator port is implemented directly by
//! [`ServoBank`](crate::drivers::servo::ServoBank).

pub mod feedback;
#[cfg(target_os = "espidf")]
pub mod http_server;
pub mod log_sink;
pub mod nvs;
pub mod system;
pub mod time;
pub mod wifi;
