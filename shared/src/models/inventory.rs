//! Inventory (stock count) workflow models
//!
//! An inventory snapshots every material's quantity when it is created.
//! Counters fill in actual quantities while the count is in progress or was
//! rejected; approval overwrites the ledger with the counted values.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkflowError;

/// Inventory status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "inventory_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryStatus {
    InProgress,
    Pending,
    Approved,
    Rejected,
}

impl InventoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::InProgress => "IN_PROGRESS",
            InventoryStatus::Pending => "PENDING",
            InventoryStatus::Approved => "APPROVED",
            InventoryStatus::Rejected => "REJECTED",
        }
    }

    /// Counts may be entered while in progress or after a rejection
    pub fn is_editable(&self) -> bool {
        matches!(self, InventoryStatus::InProgress | InventoryStatus::Rejected)
    }

    pub fn ensure_editable(self) -> Result<(), WorkflowError> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(WorkflowError::NotEditable {
                entity: "inventory",
                status: self.as_str().to_string(),
            })
        }
    }

    pub fn ensure_submittable(self) -> Result<(), WorkflowError> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(self.unexpected("IN_PROGRESS or REJECTED"))
        }
    }

    pub fn ensure_pending(self) -> Result<(), WorkflowError> {
        match self {
            InventoryStatus::Pending => Ok(()),
            _ => Err(self.unexpected("PENDING")),
        }
    }

    /// An approved inventory already affected the ledger and is kept
    pub fn ensure_removable(self) -> Result<(), WorkflowError> {
        match self {
            InventoryStatus::Approved => Err(self.unexpected("not APPROVED")),
            _ => Ok(()),
        }
    }

    fn unexpected(self, expected: &str) -> WorkflowError {
        WorkflowError::UnexpectedStatus {
            entity: "inventory",
            actual: self.as_str().to_string(),
            expected: expected.to_string(),
        }
    }
}

impl fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(InventoryStatus::InProgress),
            "PENDING" => Ok(InventoryStatus::Pending),
            "APPROVED" => Ok(InventoryStatus::Approved),
            "REJECTED" => Ok(InventoryStatus::Rejected),
            other => Err(WorkflowError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// A stock count header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Inventory {
    pub id: Uuid,
    pub inventory_number: String,
    pub inventory_date: NaiveDate,
    pub status: InventoryStatus,
    pub comment: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Counted line for one material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryItem {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub material_id: Uuid,
    /// Ledger quantity when the inventory was created
    pub system_quantity: i32,
    pub actual_quantity: Option<i32>,
    pub difference: Option<i32>,
    pub comment: Option<String>,
}

/// Counted minus recorded quantity
pub fn count_difference(system_quantity: i32, actual_quantity: i32) -> i32 {
    actual_quantity - system_quantity
}

/// Validate a counted quantity and return the resulting difference
pub fn record_count(item: &InventoryItem, actual_quantity: i32) -> Result<i32, WorkflowError> {
    if actual_quantity < 0 {
        return Err(WorkflowError::NegativeQuantity {
            field: "actual_quantity",
        });
    }
    Ok(count_difference(item.system_quantity, actual_quantity))
}

/// Every line must be counted before submission; a count of zero is a count
pub fn check_submission(items: &[InventoryItem]) -> Result<(), WorkflowError> {
    let item_ids: Vec<Uuid> = items
        .iter()
        .filter(|item| item.actual_quantity.is_none())
        .map(|item| item.id)
        .collect();

    if item_ids.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::MissingActualQuantity { item_ids })
    }
}

/// Ledger values an approval writes, as (material, counted quantity)
pub fn reconciliation_targets(items: &[InventoryItem]) -> Vec<(Uuid, i32)> {
    items
        .iter()
        .filter_map(|item| item.actual_quantity.map(|actual| (item.material_id, actual)))
        .collect()
}

/// Counting progress and discrepancies of an inventory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscrepancySummary {
    pub total_items: usize,
    pub counted_items: usize,
    pub mismatched_items: usize,
    /// Units found above the recorded quantity
    pub surplus: i64,
    /// Units missing against the recorded quantity
    pub shortage: i64,
}

pub fn summarize(items: &[InventoryItem]) -> DiscrepancySummary {
    items.iter().fold(
        DiscrepancySummary {
            total_items: items.len(),
            ..Default::default()
        },
        |mut summary, item| {
            if let Some(actual) = item.actual_quantity {
                summary.counted_items += 1;
                let difference = i64::from(count_difference(item.system_quantity, actual));
                if difference > 0 {
                    summary.mismatched_items += 1;
                    summary.surplus += difference;
                } else if difference < 0 {
                    summary.mismatched_items += 1;
                    summary.shortage += -difference;
                }
            }
            summary
        },
    )
}

/// Inventory with its lines
#[derive(Debug, Clone, Serialize)]
pub struct InventoryDetails {
    #[serde(flatten)]
    pub inventory: Inventory,
    pub summary: DiscrepancySummary,
    pub items: Vec<InventoryItem>,
}

impl InventoryDetails {
    pub fn new(inventory: Inventory, items: Vec<InventoryItem>) -> Self {
        Self {
            inventory,
            summary: summarize(&items),
            items,
        }
    }
}
