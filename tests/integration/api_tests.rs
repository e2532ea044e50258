//! HTTP API end-to-end tests: route → service → rendered JSON.
//!
//! Runs the same path as the device minus the ESP-IDF server: requests go
//! through `api::route`, forwarded commands through
//! `DispenseService::handle_command` (optionally across the channel
//! bridge), and replies through `api::render_reply`.

use crate::mock_hw::{LogSink, MockActuator, MockNotifier, MockNvs};

use embedded_hal::delay::DelayNs;
use meddispenser::api::channels::{Bridge, ReplyChannel, RequestChannel};
use meddispenser::api::{self, HttpResponse, Method, Route, SystemHealth};
use meddispenser::app::commands::AppCommand;
use meddispenser::app::service::DispenseService;
use meddispenser::config::SystemConfig;
use meddispenser::inventory::{InventoryStore, default_fixture};
use serde_json::Value;

struct Device {
    svc: DispenseService,
    hw: MockActuator,
    notes: MockNotifier,
    nvs: MockNvs,
    sink: LogSink,
    now: u64,
}

impl Device {
    fn new() -> Self {
        let mut sink = LogSink::new();
        let mut svc = DispenseService::new(
            SystemConfig::default(),
            InventoryStore::new(default_fixture()),
        );
        svc.start(&mut sink);
        Self {
            svc,
            hw: MockActuator::new(),
            notes: MockNotifier::default(),
            nvs: MockNvs::new(),
            sink,
            now: 0,
        }
    }

    fn health(&self) -> SystemHealth {
        SystemHealth {
            wifi_connected: true,
            free_heap: 150_000,
            uptime_ms: self.now,
        }
    }

    fn execute(&mut self, command: AppCommand) -> HttpResponse {
        let reply = self.svc.handle_command(
            command,
            self.now,
            &mut self.notes,
            &mut self.nvs,
            &mut self.sink,
        );
        api::render_reply(&reply, &self.health())
    }

    fn request(&mut self, method: Method, path: &str, body: &str) -> (u16, Value) {
        let resp = match api::route(method, path, body.as_bytes()) {
            Route::Immediate(resp) => resp,
            Route::Forward(command) => self.execute(command),
        };
        let json = if resp.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&resp.body).unwrap()
        };
        (resp.status, json)
    }

    fn tick(&mut self) {
        self.now += 10;
        self.svc.tick(
            self.now,
            &mut self.hw,
            &mut self.notes,
            &mut self.nvs,
            &mut self.sink,
        );
    }
}

fn medicine(inv: &Value, id: i64) -> &Value {
    inv["medicines"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["id"] == id)
        .unwrap()
}

#[test]
fn dispense_flow_over_http() {
    let mut dev = Device::new();
    let (_, inv) = dev.request(Method::Get, "/api/inventory", "");
    let before = medicine(&inv, 1)["stock"].as_u64().unwrap();

    let (status, body) = dev.request(
        Method::Post,
        "/api/dispense",
        r#"{"transactionId":"web-1","items":[{"id":1,"quantity":2}]}"#,
    );
    assert_eq!(status, 200);
    assert_eq!(body["status"], "dispensing_started");
    assert_eq!(body["transactionId"], "web-1");

    let (_, st) = dev.request(Method::Get, "/api/status", "");
    assert_eq!(st["dispensingInProgress"], true);
    assert_eq!(st["currentTransaction"], "web-1");
    assert_eq!(st["state"], "dispensing");

    let (status, body) = dev.request(
        Method::Post,
        "/api/dispense",
        r#"{"transactionId":"web-2","items":[{"id":2,"quantity":1}]}"#,
    );
    assert_eq!(status, 409);
    assert_eq!(body["error"], "Dispensing in progress");

    let (status, _) = dev.request(Method::Post, "/api/inventory", r#"{"medicineId":1,"stock":50}"#);
    assert_eq!(status, 409);

    for _ in 0..5 {
        dev.tick();
    }
    let (_, st) = dev.request(Method::Get, "/api/status", "");
    assert_eq!(st["dispensingInProgress"], false);
    assert_eq!(st["state"], "completed");

    let (_, inv) = dev.request(Method::Get, "/api/inventory", "");
    assert_eq!(medicine(&inv, 1)["stock"].as_u64().unwrap(), before - 2);
}

#[test]
fn dispense_rejections_over_http() {
    let mut dev = Device::new();
    let (status, body) = dev.request(
        Method::Post,
        "/api/dispense",
        r#"{"transactionId":"x","items":[{"id":99,"quantity":1}]}"#,
    );
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Medicine ID not found: 99");

    let (status, body) = dev.request(
        Method::Post,
        "/api/dispense",
        r#"{"transactionId":"y","items":[{"id":10,"quantity":500}]}"#,
    );
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Insufficient stock for medicine ID: 10");

    let (status, body) = dev.request(Method::Post, "/api/dispense", "{");
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid request body");
    assert!(dev.hw.calls.is_empty());
}

#[test]
fn restock_over_http() {
    let mut dev = Device::new();
    let (status, body) =
        dev.request(Method::Post, "/api/inventory", r#"{"medicineId":4,"stock":0}"#);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");

    let (_, inv) = dev.request(Method::Get, "/api/inventory", "");
    assert_eq!(medicine(&inv, 4)["stock"], 0);
    assert_eq!(medicine(&inv, 4)["available"], false);
    assert_eq!(medicine(&inv, 4)["slot"], 4);

    let (status, _) = dev.request(Method::Post, "/api/inventory", r#"{"medicineId":77,"stock":3}"#);
    assert_eq!(status, 404);
}

#[test]
fn confirmed_restock_survives_reboot() {
    let mut dev = Device::new();
    let (status, _) = dev.request(
        Method::Post,
        "/api/inventory",
        r#"{"medicineId":1,"stock":3000000000}"#,
    );
    assert_eq!(status, 400);
    let (_, inv) = dev.request(Method::Get, "/api/inventory", "");
    assert_eq!(medicine(&inv, 1)["stock"], 15);

    let body = format!(r#"{{"medicineId":1,"stock":{}}}"#, i32::MAX);
    let (status, _) = dev.request(Method::Post, "/api/inventory", &body);
    assert_eq!(status, 200);

    let (reloaded, _) = InventoryStore::load(&dev.nvs, default_fixture());
    assert_eq!(reloaded.records()[0].stock(), i32::MAX as u32);
}

#[test]
fn status_before_any_transaction() {
    let mut dev = Device::new();
    let (status, st) = dev.request(Method::Get, "/api/status", "");
    assert_eq!(status, 200);
    assert_eq!(st["currentTransaction"], "");
    assert_eq!(st["state"], "idle");
    assert_eq!(st["systemHealth"], "OK");
    assert_eq!(st["freeHeap"], 150_000);
}

#[test]
fn reset_replies_before_restart() {
    let mut dev = Device::new();
    let (status, body) = dev.request(Method::Post, "/api/reset", "");
    assert_eq!(status, 200);
    assert_eq!(body["status"], "resetting");
}

struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

#[test]
fn commands_cross_the_bridge_to_the_control_loop() {
    let requests = RequestChannel::new();
    let replies = ReplyChannel::new();
    let bridge = Bridge::new(&requests, &replies);

    std::thread::scope(|s| {
        // Control loop: serve exactly two requests.
        s.spawn(|| {
            let mut dev = Device::new();
            let mut served = 0;
            while served < 2 {
                if let Some(req) = bridge.next_request() {
                    let reply = dev.svc.handle_command(
                        req.command,
                        dev.now,
                        &mut dev.notes,
                        &mut dev.nvs,
                        &mut dev.sink,
                    );
                    bridge.reply(req.seq, reply, dev.health());
                    served += 1;
                }
                dev.tick();
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        });

        let Route::Forward(cmd) = api::route(
            Method::Post,
            "/api/dispense",
            br#"{"transactionId":"b-1","items":[{"id":2,"quantity":1}]}"#,
        ) else {
            panic!("dispense should be forwarded");
        };
        let reply = bridge.exchange(cmd, &mut SleepDelay).unwrap();
        let resp = api::render_reply(&reply.reply, &reply.health);
        assert_eq!(resp.status, 200);

        let reply = bridge
            .exchange(AppCommand::QueryStatus, &mut SleepDelay)
            .unwrap();
        let resp = api::render_reply(&reply.reply, &reply.health);
        let st: Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(st["currentTransaction"], "b-1");
        assert_eq!(st["wifiConnected"], true);
    });
}

/// Advances a counter instead of sleeping.
#[derive(Default)]
struct InstantDelay(u32);

impl DelayNs for InstantDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0 += ns / 1_000_000;
    }
    fn delay_ms(&mut self, ms: u32) {
        self.0 += ms;
    }
}

#[test]
fn dispense_answered_with_503_never_runs() {
    let requests = RequestChannel::new();
    let replies = ReplyChannel::new();
    let bridge = Bridge::new(&requests, &replies);
    let mut dev = Device::new();

    let Route::Forward(cmd) = api::route(
        Method::Post,
        "/api/dispense",
        br#"{"transactionId":"late-1","items":[{"id":1,"quantity":1}]}"#,
    ) else {
        panic!("dispense should be forwarded");
    };
    // The control loop is stalled for the whole wait.
    assert!(bridge.exchange(cmd, &mut InstantDelay::default()).is_none());
    assert_eq!(HttpResponse::unavailable().status, 503);

    // Once the loop resumes, the abandoned dispense is skipped.
    assert!(bridge.next_request().is_none());
    dev.tick();
    assert!(dev.hw.calls.is_empty());
    let (_, st) = dev.request(Method::Get, "/api/status", "");
    assert_eq!(st["dispensingInProgress"], false);
    assert_eq!(st["currentTransaction"], "");
}
