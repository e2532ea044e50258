//! Application core: pure domain logic, zero I/O.
//!
//! Request validation, the dispense state machine and inventory
//! bookkeeping.  Hardware, storage and feedback are reached only through
//! the **port traits** in [`ports`], so this layer runs unchanged on the
//! host against mock adapters.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
