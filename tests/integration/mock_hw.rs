//! Mock adapters for integration tests.
//!
//! Records every actuator and notifier call so tests can assert on the full
//! command history without touching real GPIO, PWM or flash.

use std::collections::{HashMap, VecDeque};

use meddispenser::app::events::{AppEvent, Notice};
use meddispenser::app::ports::{
    ConfigError, ConfigPort, Detection, EventSink, NotifierPort, SlotActuatorPort, StorageError,
    StoragePort,
};
use meddispenser::config::SystemConfig;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Unit(usize),
    Pause,
}

// ── MockActuator ──────────────────────────────────────────────

/// Slot actuator with scripted detection results.  Unscripted units are
/// detected.
#[derive(Default)]
pub struct MockActuator {
    pub calls: Vec<ActuatorCall>,
    pub detections: VecDeque<Detection>,
}

#[allow(dead_code)]
impl MockActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ActuatorCall::Unit(slot) => Some(*slot),
                ActuatorCall::Pause => None,
            })
            .collect()
    }

    pub fn pauses(&self) -> usize {
        self.calls.iter().filter(|c| **c == ActuatorCall::Pause).count()
    }
}

impl SlotActuatorPort for MockActuator {
    fn dispense_unit(&mut self, slot: usize) -> Detection {
        self.calls.push(ActuatorCall::Unit(slot));
        self.detections.pop_front().unwrap_or(Detection::Detected)
    }

    fn inter_item_pause(&mut self) {
        self.calls.push(ActuatorCall::Pause);
    }
}

// ── MockNotifier ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockNotifier {
    pub notices: Vec<Notice>,
}

impl NotifierPort for MockNotifier {
    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub writes: usize,
    /// Every write fails with `Full` while set.
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<&Vec<u8>> {
        self.store.get(&format!("{}::{}", namespace, key))
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&format!("{}::{}", namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Full);
        }
        self.writes += 1;
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(SystemConfig::default())
    }

    fn save(&self, _config: &SystemConfig) -> Result<(), ConfigError> {
        Ok(())
    }
}

// ── LogSink ───────────────────────────────────────────────────

#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
