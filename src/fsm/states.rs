//! Concrete state handler functions and table builder.
//!
//! ```text
//!  IDLE ──[submit]──▶ VALIDATING ──[ok]──▶ DISPENSING ──[plan done]──▶ COMPLETED
//!   ▲                     │                    │                           │
//!   │                  [fail]             [watchdog]                       │
//!   │                     ▼                    ▼                           │
//!   ├────────────────  REJECTED            TIMED_OUT ──────────────────────┤
//!   └──────────────────────────────────────────────────────────────────────┘
//!                 (terminal states fall back to IDLE on the next tick)
//! ```
//!
//! `Dispensing` issues at most one unit command per tick, so the control
//! loop keeps servicing requests and the watchdog between units.

use super::context::DispenseContext;
use super::{StateDescriptor, StateId};
use crate::app::events::Notice;
use crate::transaction::{Transaction, TransactionState};
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::Validating,
            name: "Validating",
            on_enter: Some(validating_enter),
            on_exit: None,
            on_update: validating_update,
        },
        StateDescriptor {
            id: StateId::Dispensing,
            name: "Dispensing",
            on_enter: Some(dispensing_enter),
            on_exit: Some(dispensing_exit),
            on_update: dispensing_update,
        },
        StateDescriptor {
            id: StateId::Completed,
            name: "Completed",
            on_enter: Some(completed_enter),
            on_exit: None,
            on_update: back_to_idle,
        },
        StateDescriptor {
            id: StateId::TimedOut,
            name: "TimedOut",
            on_enter: Some(timed_out_enter),
            on_exit: None,
            on_update: back_to_idle,
        },
        StateDescriptor {
            id: StateId::Rejected,
            name: "Rejected",
            on_enter: Some(rejected_enter),
            on_exit: None,
            on_update: back_to_idle,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut DispenseContext) {
    ctx.clear_plan();
}

fn idle_update(_ctx: &mut DispenseContext) -> Option<StateId> {
    // Requests arrive through `DispenseService::submit`, which forces
    // the jump to Validating.
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  VALIDATING
// ═══════════════════════════════════════════════════════════════════════════

fn validating_enter(ctx: &mut DispenseContext) {
    let Some(request) = ctx.request.take() else {
        ctx.verdict = None;
        return;
    };
    ctx.candidate = Some(Transaction::pending(&request, ctx.now_ms));
    let verdict = ctx.validate(&request);
    if let Err(reason) = &verdict {
        info!("VALIDATING: {} refused: {}", request.transaction_id, reason);
    }
    ctx.verdict = Some(verdict);
}

fn validating_update(ctx: &mut DispenseContext) -> Option<StateId> {
    match ctx.verdict {
        Some(Ok(())) => Some(StateId::Dispensing),
        Some(Err(_)) => Some(StateId::Rejected),
        None => {
            warn!("VALIDATING: entered without a request");
            Some(StateId::Idle)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISPENSING
// ═══════════════════════════════════════════════════════════════════════════

fn dispensing_enter(ctx: &mut DispenseContext) {
    if let Some(transaction) = ctx.candidate.take() {
        info!(
            "DISPENSING: {} ({} item lines)",
            transaction.id,
            ctx.plan.len()
        );
        ctx.log.begin(transaction);
    }
    ctx.log.mark_dispensing();
    ctx.notify(Notice::Started);
}

fn dispensing_exit(ctx: &mut DispenseContext) {
    ctx.clear_plan();
}

fn dispensing_update(ctx: &mut DispenseContext) -> Option<StateId> {
    // Watchdog first: a stuck transaction must not issue another unit.
    if ctx.dispense_overdue() {
        return Some(StateId::TimedOut);
    }

    if ctx.plan_finished() {
        return Some(StateId::Completed);
    }

    ctx.commands.unit = ctx.next_unit();
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  Terminal states
// ═══════════════════════════════════════════════════════════════════════════

fn completed_enter(ctx: &mut DispenseContext) {
    ctx.log.finish(TransactionState::Completed, ctx.now_ms);
    ctx.notify(Notice::Completed);
    info!("COMPLETED: all items dispensed");
}

fn timed_out_enter(ctx: &mut DispenseContext) {
    ctx.log.finish(TransactionState::TimedOut, ctx.now_ms);
    ctx.notify(Notice::Error);
    warn!(
        "TIMED_OUT: dispense exceeded {} ms, transaction abandoned",
        ctx.config.dispense_timeout_ms
    );
}

fn rejected_enter(ctx: &mut DispenseContext) {
    if let Some(candidate) = ctx.candidate.as_mut() {
        candidate.state = TransactionState::Rejected;
        candidate.finished_at_ms = Some(ctx.now_ms);
    }
    ctx.notify(Notice::Error);
}

fn back_to_idle(_ctx: &mut DispenseContext) -> Option<StateId> {
    Some(StateId::Idle)
}
