//! Write-off workflow models: outgoing and disposed stock

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StockShortfall, WorkflowError};

/// Write-off status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "write_off_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteOffStatus {
    Draft,
    Pending,
    Completed,
}

impl WriteOffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOffStatus::Draft => "DRAFT",
            WriteOffStatus::Pending => "PENDING",
            WriteOffStatus::Completed => "COMPLETED",
        }
    }

    /// Lines can only change in a draft
    pub fn ensure_draft_items(self) -> Result<(), WorkflowError> {
        match self {
            WriteOffStatus::Draft => Ok(()),
            _ => Err(WorkflowError::NotEditable {
                entity: "write-off",
                status: self.as_str().to_string(),
            }),
        }
    }

    pub fn ensure_draft(self) -> Result<(), WorkflowError> {
        match self {
            WriteOffStatus::Draft => Ok(()),
            _ => Err(self.unexpected("DRAFT")),
        }
    }

    pub fn ensure_pending(self) -> Result<(), WorkflowError> {
        match self {
            WriteOffStatus::Pending => Ok(()),
            _ => Err(self.unexpected("PENDING")),
        }
    }

    fn unexpected(self, expected: &str) -> WorkflowError {
        WorkflowError::UnexpectedStatus {
            entity: "write-off",
            actual: self.as_str().to_string(),
            expected: expected.to_string(),
        }
    }
}

impl fmt::Display for WriteOffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteOffStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(WriteOffStatus::Draft),
            "PENDING" => Ok(WriteOffStatus::Pending),
            "COMPLETED" => Ok(WriteOffStatus::Completed),
            other => Err(WorkflowError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// A write-off header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WriteOff {
    pub id: Uuid,
    pub write_off_number: String,
    pub write_off_date: NaiveDate,
    pub status: WriteOffStatus,
    pub reason: Option<String>,
    pub total_quantity: i64,
    pub total_amount: Decimal,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quantity of one material to remove from stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WriteOffItem {
    pub id: Uuid,
    pub write_off_id: Uuid,
    pub material_id: Uuid,
    pub quantity: i32,
    /// Captured from the material's price table when the line was added
    pub price_per_unit: Decimal,
    pub amount: Decimal,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Write-off with its lines
#[derive(Debug, Clone, Serialize)]
pub struct WriteOffDetails {
    #[serde(flatten)]
    pub write_off: WriteOff,
    pub items: Vec<WriteOffItem>,
}

/// Running totals of a write-off
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteOffTotals {
    pub total_quantity: i64,
    pub total_amount: Decimal,
}

pub fn recalculate_totals(items: &[WriteOffItem]) -> WriteOffTotals {
    items.iter().fold(WriteOffTotals::default(), |totals, item| WriteOffTotals {
        total_quantity: totals.total_quantity + i64::from(item.quantity),
        total_amount: totals.total_amount + item.amount,
    })
}

pub fn validate_quantity(quantity: i32) -> Result<(), WorkflowError> {
    if quantity < 0 {
        return Err(WorkflowError::NegativeQuantity { field: "quantity" });
    }
    Ok(())
}

/// A write-off needs at least one line that removes something
pub fn check_has_quantity(items: &[WriteOffItem]) -> Result<(), WorkflowError> {
    if items.iter().any(|item| item.quantity > 0) {
        Ok(())
    } else {
        Err(WorkflowError::NothingToWriteOff)
    }
}

/// Total positive quantity requested per material, ordered by material id
pub fn demand_by_material(items: &[WriteOffItem]) -> BTreeMap<Uuid, i64> {
    let mut demand = BTreeMap::new();
    for item in items.iter().filter(|item| item.quantity > 0) {
        *demand.entry(item.material_id).or_insert(0) += i64::from(item.quantity);
    }
    demand
}

/// Quantity of `material_id` the write-off would remove if `replacing`
/// (an existing line, when editing) carried `quantity` instead
pub fn planned_demand(
    items: &[WriteOffItem],
    replacing: Option<Uuid>,
    material_id: Uuid,
    quantity: i32,
) -> i64 {
    let others: i64 = items
        .iter()
        .filter(|item| item.material_id == material_id && Some(item.id) != replacing)
        .map(|item| i64::from(item.quantity.max(0)))
        .sum();
    others + i64::from(quantity)
}

/// Compare demand against on-hand stock and report every shortfall at once.
/// A material missing from `stock` counts as zero on hand.
pub fn check_stock(
    demand: &BTreeMap<Uuid, i64>,
    stock: &HashMap<Uuid, i32>,
) -> Result<(), WorkflowError> {
    let shortfalls: Vec<StockShortfall> = demand
        .iter()
        .filter_map(|(&material_id, &requested)| {
            let available = stock.get(&material_id).copied().unwrap_or(0);
            (requested > i64::from(available)).then_some(StockShortfall {
                material_id,
                requested,
                available,
            })
        })
        .collect();

    if shortfalls.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::InsufficientStock { shortfalls })
    }
}
