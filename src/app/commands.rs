//! Inbound commands to the application service and their replies.
//!
//! The HTTP layer turns requests into [`AppCommand`]s; the control loop
//! hands them to [`DispenseService::handle_command`](super::service::DispenseService::handle_command)
//! and ships the [`AppReply`] back.

use crate::error::RequestRejection;
use crate::inventory::{ItemId, SLOT_COUNT, SlotRecord};
use crate::transaction::{DispenseRequest, TransactionId, TransactionState};

#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Start a dispense transaction.
    Dispense(DispenseRequest),

    /// Overwrite one medicine's stock count.
    Restock { item_id: ItemId, stock: u32 },

    QueryStatus,

    QueryInventory,

    /// Reply, then restart the device.  The service only acknowledges;
    /// the restart is carried out by the main loop.
    Reset,
}

/// Snapshot answered to a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub busy: bool,
    /// Id of the active or most recently finished transaction.
    pub transaction_id: Option<TransactionId>,
    pub transaction_state: Option<TransactionState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppReply {
    /// Dispense accepted and started.
    Accepted(TransactionId),
    Restocked,
    Status(StatusSnapshot),
    Inventory([SlotRecord; SLOT_COUNT]),
    Resetting,
    Rejected(RequestRejection),
    /// Restock refused; rendered apart from dispense rejections because an
    /// unknown id there is a missing resource.
    RestockRejected(RequestRejection),
}

impl From<RequestRejection> for AppReply {
    fn from(reason: RequestRejection) -> Self {
        Self::Rejected(reason)
    }
}
