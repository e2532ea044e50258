//! Unified error types for the dispenser firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! travel through the controller, the request bridge and the HTTP layer
//! without allocation.

use core::fmt;

use crate::app::ports::StorageError;
use crate::drivers::hw_init::HwInitError;
use crate::inventory::ItemId;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A request was refused before anything was dispensed.
    Rejected(RequestRejection),
    /// Inventory could not be written to persistent storage.
    Persistence(PersistenceError),
    /// Peripheral initialisation failed.
    Init(HwInitError),
    /// The storage backend could not be brought up.
    Storage(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(e) => write!(f, "rejected: {e}"),
            Self::Persistence(e) => write!(f, "persistence: {e}"),
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Request rejections
// ---------------------------------------------------------------------------

/// Synchronous, pre-dispense outcomes.  The caller must resubmit (with a new
/// transaction id) once the condition has cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRejection {
    /// A transaction is currently dispensing.
    Busy,
    /// No slot holds this item id.
    NotFound(ItemId),
    /// The slot holding this item has fewer units than requested.
    InsufficientStock(ItemId),
}

impl fmt::Display for RequestRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "Dispensing in progress"),
            Self::NotFound(id) => write!(f, "Medicine ID not found: {id}"),
            Self::InsufficientStock(id) => {
                write!(f, "Insufficient stock for medicine ID: {id}")
            }
        }
    }
}

impl From<RequestRejection> for Error {
    fn from(e: RequestRejection) -> Self {
        Self::Rejected(e)
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// The inventory blob could not be written.  Non-fatal: RAM stays
/// authoritative until the next successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceError(pub StorageError);

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inventory save failed ({})", self.0)
    }
}

impl From<StorageError> for PersistenceError {
    fn from(e: StorageError) -> Self {
        Self(e)
    }
}

impl From<PersistenceError> for Error {
    fn from(e: PersistenceError) -> Self {
        Self::Persistence(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages_match_api_contract() {
        assert_eq!(RequestRejection::Busy.to_string(), "Dispensing in progress");
        assert_eq!(
            RequestRejection::NotFound(99).to_string(),
            "Medicine ID not found: 99"
        );
        assert_eq!(
            RequestRejection::InsufficientStock(3).to_string(),
            "Insufficient stock for medicine ID: 3"
        );
    }

    #[test]
    fn conversions_wrap_into_firmware_error() {
        let e: Error = RequestRejection::Busy.into();
        assert_eq!(e, Error::Rejected(RequestRejection::Busy));

        let p: PersistenceError = StorageError::IoError.into();
        let e: Error = p.into();
        assert!(matches!(e, Error::Persistence(PersistenceError(StorageError::IoError))));
        assert_eq!(e.to_string(), "persistence: inventory save failed (I/O error)");
    }

    #[test]
    fn boot_failures_reach_anyhow_at_the_binary_edge() {
        fn boot() -> anyhow::Result<()> {
            let fail: Result<()> = Err(HwInitError::LedcInitFailed(-1).into());
            fail?;
            Ok(())
        }
        let err = boot().unwrap_err();
        assert_eq!(err.to_string(), "init: LEDC timer/channel config failed (rc=-1)");

        let e: Error = StorageError::IoError.into();
        assert_eq!(e, Error::Storage(StorageError::IoError));
    }
}
