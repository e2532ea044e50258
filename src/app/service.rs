//! Application service: the hexagonal core.
//!
//! [`DispenseService`] owns the FSM and the [`DispenseContext`].  It exposes
//! a hardware-agnostic API; every side effect goes through a port passed in
//! at the call site, so the whole controller runs against mocks on the host.
//!
//! ```text
//!  AppCommand ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                 │     DispenseService      │ ──▶ NotifierPort
//!   StoragePort ◀─│  FSM · Inventory · Log   │ ──▶ SlotActuatorPort
//!                 └──────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::RequestRejection;
use crate::fsm::context::DispenseContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::inventory::{InventoryStore, ItemId};
use crate::transaction::{DispenseRequest, Transaction};

use super::commands::{AppCommand, AppReply, StatusSnapshot};
use super::events::AppEvent;
use super::ports::{EventSink, NotifierPort, SlotActuatorPort, StoragePort};

/// The application service orchestrates all domain logic.
pub struct DispenseService {
    fsm: Fsm,
    ctx: DispenseContext,
}

impl DispenseService {
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, inventory: InventoryStore) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: DispenseContext::new(config, inventory),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("DispenseService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One control-loop step: watchdog and FSM, then at most one unit of
    /// actuation, then persistence and feedback.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut impl SlotActuatorPort,
        notifier: &mut impl NotifierPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;

        // 1. FSM step (watchdog is evaluated inside Dispensing)
        self.step(sink);

        // 2. Execute the unit the Dispensing handler asked for
        if let Some(cmd) = self.ctx.commands.unit.take() {
            if cmd.pause_before {
                hw.inter_item_pause();
            }
            let detection = hw.dispense_unit(cmd.slot);
            self.ctx.record_unit(detection);
        }

        // 3. Persist after a whole item has been consumed
        if core::mem::take(&mut self.ctx.commands.persist) {
            self.persist_inventory(storage, sink);
        }

        // 4. Audible / visual feedback
        self.flush_notices(notifier);
    }

    // ── Controller operations ─────────────────────────────────

    /// Validate a request and, when it passes, start dispensing it.
    ///
    /// While a transaction is dispensing this returns `Busy` without
    /// touching the FSM or emitting feedback.
    pub fn submit(
        &mut self,
        request: DispenseRequest,
        now_ms: u64,
        notifier: &mut impl NotifierPort,
        sink: &mut impl EventSink,
    ) -> Result<(), RequestRejection> {
        let id = request.transaction_id.clone();
        if self.is_busy() {
            sink.emit(&AppEvent::TransactionRejected {
                id,
                reason: RequestRejection::Busy,
            });
            return Err(RequestRejection::Busy);
        }

        self.ctx.now_ms = now_ms;
        self.ctx.request = Some(request);
        self.ctx.verdict = None;
        self.transition(StateId::Validating, sink);
        self.step(sink);
        self.flush_notices(notifier);

        match self.ctx.verdict.take() {
            Some(Ok(())) => {
                sink.emit(&AppEvent::TransactionAccepted {
                    id,
                    items: self.ctx.plan.len(),
                });
                Ok(())
            }
            Some(Err(reason)) => {
                sink.emit(&AppEvent::TransactionRejected { id, reason });
                Err(reason)
            }
            None => {
                warn!("submit: validation produced no verdict for {}", id);
                Err(RequestRejection::Busy)
            }
        }
    }

    /// Overwrite the stock of `item_id` and persist.  Refused while
    /// dispensing so a restock never races an item's consumption.
    pub fn restock(
        &mut self,
        item_id: ItemId,
        stock: u32,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> Result<(), RequestRejection> {
        if self.is_busy() {
            return Err(RequestRejection::Busy);
        }
        self.ctx
            .inventory
            .restock(item_id, stock)
            .ok_or(RequestRejection::NotFound(item_id))?;
        self.persist_inventory(storage, sink);
        Ok(())
    }

    pub fn query_status(&self) -> StatusSnapshot {
        let current = self.ctx.log.current();
        StatusSnapshot {
            busy: self.is_busy(),
            transaction_id: current.map(|t| t.id.clone()),
            transaction_state: current.map(|t| t.state),
        }
    }

    pub fn query_inventory(&self) -> &InventoryStore {
        &self.ctx.inventory
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (from the HTTP bridge).
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u64,
        notifier: &mut impl NotifierPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> AppReply {
        match cmd {
            AppCommand::Dispense(request) => {
                let id = request.transaction_id.clone();
                match self.submit(request, now_ms, notifier, sink) {
                    Ok(()) => AppReply::Accepted(id),
                    Err(reason) => reason.into(),
                }
            }
            AppCommand::Restock { item_id, stock } => {
                match self.restock(item_id, stock, storage, sink) {
                    Ok(()) => AppReply::Restocked,
                    Err(reason) => AppReply::RestockRejected(reason),
                }
            }
            AppCommand::QueryStatus => AppReply::Status(self.query_status()),
            AppCommand::QueryInventory => AppReply::Inventory(*self.ctx.inventory.records()),
            AppCommand::Reset => {
                info!("Reset requested");
                AppReply::Resetting
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn is_busy(&self) -> bool {
        self.fsm.current_state() == StateId::Dispensing
    }

    /// Active or most recently finished transaction.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.ctx.log.current()
    }

    // ── Internal ──────────────────────────────────────────────

    /// FSM tick plus the events its transition implies.
    fn step(&mut self, sink: &mut impl EventSink) {
        let prev = self.fsm.current_state();
        self.fsm.tick(&mut self.ctx);
        let next = self.fsm.current_state();
        if next != prev {
            self.emit_transition(prev, next, sink);
        }
    }

    fn transition(&mut self, next: StateId, sink: &mut impl EventSink) {
        let prev = self.fsm.current_state();
        self.fsm.force_transition(next, &mut self.ctx);
        if next != prev {
            self.emit_transition(prev, next, sink);
        }
    }

    fn emit_transition(&self, from: StateId, to: StateId, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::StateChanged { from, to });
        if matches!(to, StateId::Completed | StateId::TimedOut) {
            if let Some(t) = self.ctx.log.current() {
                sink.emit(&AppEvent::TransactionFinished {
                    id: t.id.clone(),
                    state: t.state,
                    units_dispensed: t.units_dispensed,
                    units_unconfirmed: t.units_unconfirmed,
                });
            }
        }
    }

    fn persist_inventory(&self, storage: &mut impl StoragePort, sink: &mut impl EventSink) {
        match self.ctx.inventory.save(storage) {
            Ok(()) => sink.emit(&AppEvent::InventoryPersisted),
            Err(e) => {
                warn!("{}; keeping in-memory inventory", e);
                sink.emit(&AppEvent::PersistFailed(e));
            }
        }
    }

    fn flush_notices(&mut self, notifier: &mut impl NotifierPort) {
        for notice in self.ctx.notices.iter().copied() {
            notifier.notify(notice);
        }
        self.ctx.notices.clear();
    }
}
