//! Outbound application events.
//!
//! Two separate streams leave the core:
//!
//! - [`AppEvent`]s go through the [`EventSink`](super::ports::EventSink)
//!   port for structured logging.
//! - [`Notice`]s go through the [`NotifierPort`](super::ports::NotifierPort)
//!   and become beeps and LED changes on the device.

use crate::error::{PersistenceError, RequestRejection};
use crate::fsm::StateId;
use crate::transaction::{TransactionId, TransactionState};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service has started (carries the initial state).
    Started(StateId),

    /// The controller moved between states.
    StateChanged { from: StateId, to: StateId },

    /// A request passed validation and actuation is about to begin.
    TransactionAccepted { id: TransactionId, items: usize },

    /// A request was refused before anything moved.
    TransactionRejected {
        id: TransactionId,
        reason: RequestRejection,
    },

    /// A transaction reached a terminal state.
    TransactionFinished {
        id: TransactionId,
        state: TransactionState,
        units_dispensed: u32,
        units_unconfirmed: u32,
    },

    /// Inventory written to storage after a mutation.
    InventoryPersisted,

    /// Inventory write failed; in-memory state stays authoritative.
    PersistFailed(PersistenceError),
}

/// Lifecycle feedback for the buzzer and indicator LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Device finished booting.
    Startup,
    /// A transaction began dispensing.
    Started,
    /// One unit left `slot`; `confirmed` is the detection sensor's verdict.
    UnitDispensed { slot: usize, confirmed: bool },
    /// The transaction dispensed everything it asked for.
    Completed,
    /// Validation failure or dispense timeout.
    Error,
}
