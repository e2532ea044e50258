//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production, stderr on the host).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::TransactionAccepted { id, items } => {
                info!("TXN   | {} accepted | items={}", id, items);
            }
            AppEvent::TransactionRejected { id, reason } => {
                warn!("TXN   | {} rejected | {}", id, reason);
            }
            AppEvent::TransactionFinished {
                id,
                state,
                units_dispensed,
                units_unconfirmed,
            } => {
                info!(
                    "TXN   | {} {} | units={} unconfirmed={}",
                    id,
                    state.as_str(),
                    units_dispensed,
                    units_unconfirmed
                );
            }
            AppEvent::InventoryPersisted => {
                info!("INV   | saved");
            }
            AppEvent::PersistFailed(e) => {
                warn!("INV   | {}", e);
            }
        }
    }
}
