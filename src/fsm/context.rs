//! Shared mutable context threaded through every FSM handler.
//!
//! `DispenseContext` is the controller's whole state: inventory, the
//! transaction log, the request being validated, the dispense plan and
//! the command/notice outboxes that the service drains after each step.
//! Nothing lives in globals; handlers receive it by `&mut`.
//!
//! Validation is deliberately stricter than checking each line against
//! current stock on its own: lines that resolve to the same slot are
//! summed first, so `[{1, 3}, {1, 3}]` against a stock of 5 is refused
//! instead of dispensing six units from five.

use heapless::Vec;
use log::warn;

use crate::app::events::Notice;
use crate::app::ports::Detection;
use crate::config::SystemConfig;
use crate::error::RequestRejection;
use crate::inventory::{InventoryStore, ItemId, SLOT_COUNT};
use crate::transaction::{
    DispenseRequest, MAX_REQUEST_ITEMS, Transaction, TransactionLog, TransactionState,
};

const NOTICE_CAP: usize = 8;

// ---------------------------------------------------------------------------
// Dispense plan
// ---------------------------------------------------------------------------

/// One request line resolved to its slot, with progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedItem {
    pub item_id: ItemId,
    pub slot: usize,
    pub quantity: u32,
    pub dispensed: u32,
}

impl PlannedItem {
    pub fn is_done(&self) -> bool {
        self.dispensed >= self.quantity
    }
}

// ---------------------------------------------------------------------------
// Actuation commands (written by state handlers; executed by the service)
// ---------------------------------------------------------------------------

/// One physical unit requested by the `Dispensing` handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitCommand {
    pub slot: usize,
    /// First unit of an item other than the first: run the inter-item
    /// pause before actuating.
    pub pause_before: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ActuationCommands {
    pub unit: Option<UnitCommand>,
    /// Inventory changed and must be written out.
    pub persist: bool,
}

// ---------------------------------------------------------------------------
// DispenseContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct DispenseContext {
    // -- Timing --
    /// Monotonic milliseconds, refreshed by the service before each step.
    pub now_ms: u64,

    // -- Configuration --
    pub config: SystemConfig,

    // -- Shared state --
    pub inventory: InventoryStore,
    pub log: TransactionLog,

    // -- Request in flight --
    /// Request handed over by `submit`, consumed by validation.
    pub request: Option<DispenseRequest>,
    /// Validation result for `request`.
    pub verdict: Option<Result<(), RequestRejection>>,
    /// Transaction built during validation; moves into `log` on acceptance.
    pub candidate: Option<Transaction>,
    pub plan: Vec<PlannedItem, MAX_REQUEST_ITEMS>,
    /// Index into `plan` of the item being dispensed.
    pub cursor: usize,

    // -- Outboxes --
    pub commands: ActuationCommands,
    pub notices: Vec<Notice, NOTICE_CAP>,
}

impl DispenseContext {
    pub fn new(config: SystemConfig, inventory: InventoryStore) -> Self {
        Self {
            now_ms: 0,
            config,
            inventory,
            log: TransactionLog::new(),
            request: None,
            verdict: None,
            candidate: None,
            plan: Vec::new(),
            cursor: 0,
            commands: ActuationCommands::default(),
            notices: Vec::new(),
        }
    }

    pub fn notify(&mut self, notice: Notice) {
        if self.notices.push(notice).is_err() {
            warn!("Notice outbox full, dropping {:?}", notice);
        }
    }

    /// Validate `request` against current stock and build the plan.
    ///
    /// All-or-nothing: the first item without a slot, or the first item
    /// that pushes its slot's running total past the stock, fails the
    /// whole request.  Lines resolving to the same slot are summed.
    pub fn validate(&mut self, request: &DispenseRequest) -> Result<(), RequestRejection> {
        let mut requested = [0u32; SLOT_COUNT];
        let mut plan = Vec::new();

        for item in &request.items {
            let slot = self
                .inventory
                .find_slot(item.item_id)
                .ok_or(RequestRejection::NotFound(item.item_id))?;
            let quantity = item.quantity.get();
            requested[slot] = requested[slot].saturating_add(quantity);

            let stock = self.inventory.records()[slot].stock();
            if requested[slot] > stock {
                return Err(RequestRejection::InsufficientStock(item.item_id));
            }
            // Capacity matches the request's own bound, so this cannot fail.
            let _ = plan.push(PlannedItem {
                item_id: item.item_id,
                slot,
                quantity,
                dispensed: 0,
            });
        }

        self.plan = plan;
        self.cursor = 0;
        Ok(())
    }

    /// Next unit to actuate, or `None` when every item is done.
    pub fn next_unit(&self) -> Option<UnitCommand> {
        let item = self.plan.get(self.cursor)?;
        Some(UnitCommand {
            slot: item.slot,
            pause_before: self.cursor > 0 && item.dispensed == 0,
        })
    }

    /// Book the outcome of one actuation.  When the item's last unit has
    /// gone, its whole quantity is consumed from inventory at once and a
    /// save is requested, so observers never see a half-consumed item.
    pub fn record_unit(&mut self, detection: Detection) {
        let Some(item) = self.plan.get_mut(self.cursor) else {
            return;
        };
        item.dispensed += 1;
        let slot = item.slot;
        let finished = item.is_done().then_some(item.quantity);

        self.log.record_unit(detection);
        let confirmed = detection == Detection::Detected;
        if !confirmed {
            warn!("Slot {}: unit not confirmed by detection sensor", slot + 1);
        }
        self.notify(Notice::UnitDispensed { slot, confirmed });

        if let Some(quantity) = finished {
            self.inventory.apply_consumption(slot, quantity);
            self.commands.persist = true;
            self.cursor += 1;
        }
    }

    pub fn plan_finished(&self) -> bool {
        self.cursor >= self.plan.len()
    }

    /// True once the active transaction has run past the timeout ceiling.
    pub fn dispense_overdue(&self) -> bool {
        self.log.current().is_some_and(|t| {
            t.state == TransactionState::Dispensing
                && t.elapsed_ms(self.now_ms) > self.config.dispense_timeout_ms
        })
    }

    /// Drop the plan and any queued unit.
    pub fn clear_plan(&mut self) {
        self.plan.clear();
        self.cursor = 0;
        self.commands.unit = None;
    }
}
