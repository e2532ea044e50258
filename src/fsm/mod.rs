//! Function-pointer finite state machine engine for the dispense controller.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  StateTable                                                   │
//! │  ┌────────────┬───────────┬──────────┬───────────────────┐    │
//! │  │ StateId    │ on_enter  │ on_exit  │ on_update         │    │
//! │  ├────────────┼───────────┼──────────┼───────────────────┤    │
//! │  │ Idle       │ fn(ctx)   │    -     │ fn(ctx)->Option<> │    │
//! │  │ Validating │ fn(ctx)   │    -     │ fn(ctx)->Option<> │    │
//! │  │ Dispensing │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │    │
//! │  │ Completed  │ fn(ctx)   │    -     │ fn(ctx)->Option<> │    │
//! │  │ TimedOut   │ fn(ctx)   │    -     │ fn(ctx)->Option<> │    │
//! │  │ Rejected   │ fn(ctx)   │    -     │ fn(ctx)->Option<> │    │
//! │  └────────────┴───────────┴──────────┴───────────────────┘    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the current state.  A
//! `Some(next_id)` result runs `on_exit` for the current state, then
//! `on_enter` for the next.  Handlers never touch hardware: they read
//! and write the [`DispenseContext`] and leave actuation commands in it
//! for the service to execute.

pub mod context;
pub mod states;

use context::DispenseContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Every controller state.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    Validating = 1,
    Dispensing = 2,
    Completed = 3,
    TimedOut = 4,
    Rejected = 5,
}

impl StateId {
    pub const COUNT: usize = 6;

    /// Convert a table index back to `StateId`.  Out-of-range indices trip
    /// a debug assertion and map to `Idle` in release builds.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Validating,
            2 => Self::Dispensing,
            3 => Self::Completed,
            4 => Self::TimedOut,
            5 => Self::Rejected,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit`: run exactly once per transition.
pub type StateActionFn = fn(&mut DispenseContext);

/// Per-tick handler.  `Some(next)` triggers a transition.
pub type StateUpdateFn = fn(&mut DispenseContext) -> Option<StateId>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "state table out of order"
        );
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut DispenseContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one step: `on_update`, then the transition it asked for.
    pub fn tick(&mut self, ctx: &mut DispenseContext) {
        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Jump straight to `next` (used by request submission), running the
    /// exit/enter actions.  No-op when already there.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut DispenseContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn state_name(&self) -> &'static str {
        self.table[self.current].name
    }

    fn transition(&mut self, next_id: StateId, ctx: &mut DispenseContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::context::DispenseContext;
    use super::*;
    use crate::app::ports::Detection;
    use crate::config::SystemConfig;
    use crate::inventory::InventoryStore;
    use crate::transaction::{DispenseItem, DispenseRequest, RequestItems, TransactionId};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Submit(Vec<(i32, u32)>),
        Tick(u64),
    }

    fn arb_step() -> impl Strategy<Value = Step> {
        prop_oneof![
            proptest::collection::vec((0i32..14, 1u32..6), 1..4).prop_map(Step::Submit),
            (0u64..120_000).prop_map(Step::Tick),
        ]
    }

    fn to_request(items: &[(i32, u32)]) -> DispenseRequest {
        let mut list = RequestItems::new();
        for &(id, qty) in items {
            let _ = list.push(DispenseItem::new(id, qty).unwrap());
        }
        DispenseRequest {
            transaction_id: TransactionId::try_from("p").unwrap(),
            items: list,
        }
    }

    proptest! {
        #[test]
        fn stock_never_negative_and_dispensing_matches_log(
            steps in proptest::collection::vec(arb_step(), 1..60)
        ) {
            let mut fsm = Fsm::new(states::build_state_table(), StateId::Idle);
            let mut ctx = DispenseContext::new(SystemConfig::default(), InventoryStore::default());
            fsm.start(&mut ctx);

            for step in steps {
                match step {
                    Step::Submit(items) => {
                        if fsm.current_state() != StateId::Dispensing {
                            ctx.request = Some(to_request(&items));
                            fsm.force_transition(StateId::Validating, &mut ctx);
                            fsm.tick(&mut ctx);
                        }
                    }
                    Step::Tick(dt) => {
                        ctx.now_ms += dt;
                        fsm.tick(&mut ctx);
                        if ctx.commands.unit.take().is_some() {
                            ctx.record_unit(Detection::Detected);
                        }
                    }
                }

                for rec in ctx.inventory.records() {
                    prop_assert_eq!(rec.is_available(), rec.stock() > 0);
                }
                prop_assert_eq!(
                    fsm.current_state() == StateId::Dispensing,
                    ctx.log.is_dispensing()
                );
            }
        }
    }
}
