//! MedDispenser Firmware, main entry point.
//!
//! Hexagonal architecture with a single synchronous control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  ServoBank        FeedbackAdapter   NvsAdapter   LogEventSink  │
//! │  (SlotActuator)   (Notifier)        (Config+NVS) (EventSink)   │
//! │  WifiAdapter      HTTP server ──▶ api::channels ──┐            │
//! │  (Connectivity)   (httpd task)                    │            │
//! │                                                   ▼            │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │           DispenseService (pure logic)                 │    │
//! │  │  FSM · InventoryStore · TransactionLog                 │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  SystemMonitor (WiFi + heap) · Watchdog (TWDT)                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use embedded_hal::delay::DelayNs;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use meddispenser::adapters::feedback::FeedbackAdapter;
use meddispenser::adapters::log_sink::LogEventSink;
use meddispenser::adapters::nvs::NvsAdapter;
use meddispenser::adapters::time::{MonotonicClock, TaskDelay};
use meddispenser::adapters::wifi::WifiAdapter;
use meddispenser::adapters::{http_server, system};
use meddispenser::api::SystemHealth;
use meddispenser::api::channels::bridge;
use meddispenser::app::commands::AppCommand;
use meddispenser::app::events::Notice;
use meddispenser::app::ports::{ConfigPort, ConnectivityPort, NotifierPort};
use meddispenser::app::service::DispenseService;
use meddispenser::config::SystemConfig;
use meddispenser::drivers::buzzer::Buzzer;
use meddispenser::drivers::hw_init;
use meddispenser::drivers::indicators::{Indicator, Indicators};
use meddispenser::drivers::servo::ServoBank;
use meddispenser::drivers::watchdog::Watchdog;
use meddispenser::error::Error;
use meddispenser::inventory::{InventoryStore, LoadSource, default_fixture};
use meddispenser::monitor::SystemMonitor;

/// Time between answering a reset request and restarting, so the reply
/// leaves the socket.
const RESET_DELAY_MS: u32 = 1000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  MedDispenser v{}                 ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. Peripherals ────────────────────────────────────────
    hw_init::init_peripherals()?;

    // ── 3. Storage, config, inventory ─────────────────────────
    let mut nvs = NvsAdapter::new().map_err(Error::from)?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    let (inventory, source) = InventoryStore::load(&nvs, default_fixture());
    if source == LoadSource::Fixture {
        if let Err(e) = inventory.save(&mut nvs) {
            warn!("Initial inventory save failed: {}", e);
        }
    }

    // ── 4. Adapters ───────────────────────────────────────────
    let clock = MonotonicClock::new();
    let mut servos = ServoBank::new(TaskDelay);
    servos.home_all();

    let mut feedback = FeedbackAdapter::new(Buzzer::default(), Indicators::new(), TaskDelay);
    let mut log_sink = LogEventSink::new();

    // ── 5. Application service ────────────────────────────────
    let mut service = DispenseService::new(config.clone(), inventory);
    service.start(&mut log_sink);
    feedback.notify(Notice::Startup);

    // ── 6. Network ────────────────────────────────────────────
    let mut wifi = WifiAdapter::new(peripherals.modem, sysloop, EspDefaultNvsPartition::take().ok())?;
    if config.has_wifi_credentials() {
        match wifi.set_credentials(&config.wifi_ssid, &config.wifi_password) {
            Ok(()) => {
                if let Err(e) = wifi.connect() {
                    warn!("WiFi: initial connect failed ({}), monitor will retry", e);
                }
            }
            Err(e) => warn!("WiFi: stored credentials rejected ({})", e),
        }
    } else {
        warn!("WiFi: no credentials configured, running offline");
    }
    feedback
        .indicators_mut()
        .set(Indicator::Status, wifi.is_connected());

    let _server = http_server::start(config.http_port)?;

    let mut watchdog = Watchdog::new();
    let mut monitor = SystemMonitor::new(&config);
    let bridge = bridge();

    info!("System ready. Entering control loop.");

    // ── 7. Control loop ───────────────────────────────────────
    loop {
        while let Some(request) = bridge.next_request() {
            let reset = matches!(request.command, AppCommand::Reset);
            let reply = service.handle_command(
                request.command,
                clock.now_ms(),
                &mut feedback,
                &mut nvs,
                &mut log_sink,
            );
            let health = SystemHealth {
                wifi_connected: wifi.is_connected(),
                free_heap: system::free_heap(),
                uptime_ms: clock.now_ms(),
            };
            bridge.reply(request.seq, reply, health);

            if reset {
                TaskDelay.delay_ms(RESET_DELAY_MS);
                system::restart();
            }
        }

        service.tick(
            clock.now_ms(),
            &mut servos,
            &mut feedback,
            &mut nvs,
            &mut log_sink,
        );

        monitor.poll(
            clock.now_ms(),
            system::free_heap(),
            &mut wifi,
            feedback.indicators_mut(),
        );

        watchdog.feed();
        TaskDelay.delay_ms(config.control_loop_interval_ms);
    }
}
