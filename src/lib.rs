//! MedDispenser firmware library.
//!
//! Exposes the dispensing core, the HTTP route layer and the adapters for
//! integration testing.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; everything else
//! builds and runs on the host.

#![deny(unused_must_use)]

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod inventory;
pub mod monitor;
pub mod pins;
pub mod transaction;

pub mod adapters;
pub mod drivers;
