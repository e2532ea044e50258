//! Dispense requests and the single-slot transaction log.
//!
//! The log remembers the one transaction that was most recently accepted:
//! who asked (`id`), when it started, how far it got and how it ended.  It
//! is not a history: accepting a new request replaces the previous entry,
//! and rejected requests never reach it.

use core::num::NonZeroU32;

use crate::app::ports::Detection;
use crate::inventory::ItemId;

/// Longest accepted transaction id, in bytes.
pub const MAX_TRANSACTION_ID_LEN: usize = 48;

/// Most items a single request may carry.
pub const MAX_REQUEST_ITEMS: usize = 16;

pub type TransactionId = heapless::String<MAX_TRANSACTION_ID_LEN>;
pub type RequestItems = heapless::Vec<DispenseItem, MAX_REQUEST_ITEMS>;

/// One line of a dispense request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispenseItem {
    pub item_id: ItemId,
    pub quantity: NonZeroU32,
}

impl DispenseItem {
    /// `None` when `quantity` is zero.
    pub fn new(item_id: ItemId, quantity: u32) -> Option<Self> {
        NonZeroU32::new(quantity).map(|quantity| Self { item_id, quantity })
    }
}

/// A validated-shape request as handed to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenseRequest {
    pub transaction_id: TransactionId,
    pub items: RequestItems,
}

/// Lifecycle of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Accepted by validation, actuation not yet begun.
    Pending,
    Dispensing,
    Completed,
    /// The dispense watchdog gave up on it.
    TimedOut,
    /// Failed validation; discarded without touching inventory.
    Rejected,
}

impl TransactionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispensing => "dispensing",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub items: RequestItems,
    pub started_at_ms: u64,
    pub finished_at_ms: Option<u64>,
    pub state: TransactionState,
    pub units_dispensed: u32,
    /// Units whose detection sensor did not confirm the drop.
    pub units_unconfirmed: u32,
}

impl Transaction {
    pub fn pending(request: &DispenseRequest, now_ms: u64) -> Self {
        Self {
            id: request.transaction_id.clone(),
            items: request.items.clone(),
            started_at_ms: now_ms,
            finished_at_ms: None,
            state: TransactionState::Pending,
            units_dispensed: 0,
            units_unconfirmed: 0,
        }
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at_ms)
    }
}

/// Holds at most one transaction: the active one, or the last to finish.
#[derive(Debug, Default)]
pub struct TransactionLog {
    current: Option<Transaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was logged with a freshly accepted transaction.
    pub fn begin(&mut self, transaction: Transaction) {
        self.current = Some(transaction);
    }

    pub fn current(&self) -> Option<&Transaction> {
        self.current.as_ref()
    }

    pub fn is_dispensing(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|t| t.state == TransactionState::Dispensing)
    }

    pub fn mark_dispensing(&mut self) {
        if let Some(t) = self.current.as_mut() {
            t.state = TransactionState::Dispensing;
        }
    }

    pub fn record_unit(&mut self, detection: Detection) {
        if let Some(t) = self.current.as_mut() {
            t.units_dispensed += 1;
            if detection == Detection::NotDetected {
                t.units_unconfirmed += 1;
            }
        }
    }

    /// Move the active transaction into a terminal state.  No-op when
    /// nothing is dispensing, so a late watchdog cannot overwrite a
    /// completed entry.
    pub fn finish(&mut self, state: TransactionState, now_ms: u64) {
        debug_assert!(state.is_terminal());
        if let Some(t) = self.current.as_mut() {
            if t.state == TransactionState::Dispensing {
                t.state = state;
                t.finished_at_ms = Some(now_ms);
            }
        }
    }
}
