//! Workflow rule violations
//!
//! Every precondition the purchase, inventory and write-off workflows check
//! before touching the database is reported through [`WorkflowError`]. The
//! variants carry enough detail (item ids, per-material shortfalls) for a
//! caller to correct the aggregate and retry.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Requested write-off quantity the ledger cannot cover
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockShortfall {
    pub material_id: Uuid,
    /// Sum of all positive line quantities referencing the material
    pub requested: i64,
    pub available: i32,
}

impl StockShortfall {
    pub fn missing(&self) -> i64 {
        self.requested - i64::from(self.available)
    }
}

/// A workflow precondition that failed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum WorkflowError {
    #[error("{entity} is {actual}, expected {expected}")]
    UnexpectedStatus {
        entity: &'static str,
        actual: String,
        expected: String,
    },

    #[error("{entity} cannot be edited while {status}")]
    NotEditable { entity: &'static str, status: String },

    #[error("status {status} is only reachable through its dedicated operation")]
    GatedStatus { status: String },

    #[error("unknown status {value}")]
    UnknownStatus { value: String },

    #[error("{field} must not be negative")]
    NegativeQuantity { field: &'static str },

    #[error("received quantity {received} exceeds ordered quantity {ordered}")]
    OverReceipt {
        item_id: Uuid,
        ordered: i32,
        received: i32,
    },

    #[error("ordered quantity {ordered} is below the received quantity {received}")]
    OrderedBelowReceived {
        item_id: Uuid,
        ordered: i32,
        received: i32,
    },

    #[error("purchase has no items")]
    EmptyPurchase,

    #[error("{} item(s) are not fully received", .item_ids.len())]
    NotFullyReceived { item_ids: Vec<Uuid> },

    #[error("{} item(s) have no actual quantity", .item_ids.len())]
    MissingActualQuantity { item_ids: Vec<Uuid> },

    #[error("write-off has no items with a positive quantity")]
    NothingToWriteOff,

    #[error("insufficient stock for {} material(s)", .shortfalls.len())]
    InsufficientStock { shortfalls: Vec<StockShortfall> },
}

impl WorkflowError {
    /// Whether the error is a forbidden transition rather than a failed precondition
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            WorkflowError::GatedStatus { .. } | WorkflowError::NotEditable { .. }
        )
    }
}
