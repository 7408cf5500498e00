//! Purchase workflow models: incoming stock
//!
//! A purchase moves freely between its open statuses. `RECEIVED` is gated:
//! only a validated submission reaches it, so the generic status update
//! accepts [`OpenPurchaseStatus`] and never the full [`PurchaseStatus`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::types::{line_amount, Dimensions};

/// Purchase status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "purchase_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseStatus {
    InProcess,
    UnderReview,
    Planning,
    Launch,
    Expired,
    Received,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::InProcess => "IN_PROCESS",
            PurchaseStatus::UnderReview => "UNDER_REVIEW",
            PurchaseStatus::Planning => "PLANNING",
            PurchaseStatus::Launch => "LAUNCH",
            PurchaseStatus::Expired => "EXPIRED",
            PurchaseStatus::Received => "RECEIVED",
        }
    }

    /// The open status the purchase is in, or an error once it is received
    pub fn ensure_open(self) -> Result<OpenPurchaseStatus, WorkflowError> {
        OpenPurchaseStatus::try_from(self).map_err(|_| WorkflowError::UnexpectedStatus {
            entity: "purchase",
            actual: self.as_str().to_string(),
            expected: "an open status".to_string(),
        })
    }

    /// Items may only change before the purchase is received
    pub fn ensure_editable(self) -> Result<(), WorkflowError> {
        match self {
            PurchaseStatus::Received => Err(WorkflowError::NotEditable {
                entity: "purchase",
                status: self.as_str().to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROCESS" => Ok(PurchaseStatus::InProcess),
            "UNDER_REVIEW" => Ok(PurchaseStatus::UnderReview),
            "PLANNING" => Ok(PurchaseStatus::Planning),
            "LAUNCH" => Ok(PurchaseStatus::Launch),
            "EXPIRED" => Ok(PurchaseStatus::Expired),
            "RECEIVED" => Ok(PurchaseStatus::Received),
            other => Err(WorkflowError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// Statuses reachable through the generic status update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpenPurchaseStatus {
    InProcess,
    UnderReview,
    Planning,
    Launch,
    Expired,
}

impl From<OpenPurchaseStatus> for PurchaseStatus {
    fn from(status: OpenPurchaseStatus) -> Self {
        match status {
            OpenPurchaseStatus::InProcess => PurchaseStatus::InProcess,
            OpenPurchaseStatus::UnderReview => PurchaseStatus::UnderReview,
            OpenPurchaseStatus::Planning => PurchaseStatus::Planning,
            OpenPurchaseStatus::Launch => PurchaseStatus::Launch,
            OpenPurchaseStatus::Expired => PurchaseStatus::Expired,
        }
    }
}

impl TryFrom<PurchaseStatus> for OpenPurchaseStatus {
    type Error = WorkflowError;

    fn try_from(status: PurchaseStatus) -> Result<Self, Self::Error> {
        match status {
            PurchaseStatus::InProcess => Ok(OpenPurchaseStatus::InProcess),
            PurchaseStatus::UnderReview => Ok(OpenPurchaseStatus::UnderReview),
            PurchaseStatus::Planning => Ok(OpenPurchaseStatus::Planning),
            PurchaseStatus::Launch => Ok(OpenPurchaseStatus::Launch),
            PurchaseStatus::Expired => Ok(OpenPurchaseStatus::Expired),
            PurchaseStatus::Received => Err(WorkflowError::GatedStatus {
                status: status.as_str().to_string(),
            }),
        }
    }
}

/// Purchase line status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "purchase_item_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseItemStatus {
    Ordered,
    Ready,
    Received,
}

impl PurchaseItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseItemStatus::Ordered => "ORDERED",
            PurchaseItemStatus::Ready => "READY",
            PurchaseItemStatus::Received => "RECEIVED",
        }
    }

    /// Status of a line after goods were counted at the gate
    pub fn for_received_quantity(received_quantity: i32) -> Self {
        if received_quantity > 0 {
            PurchaseItemStatus::Ready
        } else {
            PurchaseItemStatus::Ordered
        }
    }
}

/// A purchase order header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Purchase {
    pub id: Uuid,
    pub purchase_number: String,
    pub supplier_id: Uuid,
    pub purchase_date: NaiveDate,
    pub status: PurchaseStatus,
    pub total_amount: Decimal,
    pub comment: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchase line for a material item definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseItem {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub material_item_id: Uuid,
    pub ordered_quantity: i32,
    pub received_quantity: i32,
    pub price_per_unit: Decimal,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub dimensions: Dimensions,
    pub status: PurchaseItemStatus,
    /// Material lot created when the purchase was received
    pub material_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseItem {
    pub fn amount(&self) -> Decimal {
        line_amount(self.price_per_unit, self.ordered_quantity)
    }

    pub fn is_fully_received(&self) -> bool {
        self.status == PurchaseItemStatus::Ready && self.received_quantity >= self.ordered_quantity
    }
}

/// Purchase with its lines
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseDetails {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub items: Vec<PurchaseItem>,
}

/// Purchase total: sum of price × ordered quantity
pub fn total_amount(items: &[PurchaseItem]) -> Decimal {
    items.iter().map(PurchaseItem::amount).sum()
}

/// Validate an absolute received quantity and return the resulting line status
pub fn receive_quantity(
    item: &PurchaseItem,
    received_quantity: i32,
) -> Result<PurchaseItemStatus, WorkflowError> {
    if received_quantity < 0 {
        return Err(WorkflowError::NegativeQuantity {
            field: "received_quantity",
        });
    }
    if received_quantity > item.ordered_quantity {
        return Err(WorkflowError::OverReceipt {
            item_id: item.id,
            ordered: item.ordered_quantity,
            received: received_quantity,
        });
    }
    Ok(PurchaseItemStatus::for_received_quantity(received_quantity))
}

/// Validate a new ordered quantity against what has already been received
pub fn reorder_quantity(item: &PurchaseItem, ordered_quantity: i32) -> Result<(), WorkflowError> {
    if ordered_quantity < item.received_quantity {
        return Err(WorkflowError::OrderedBelowReceived {
            item_id: item.id,
            ordered: ordered_quantity,
            received: item.received_quantity,
        });
    }
    Ok(())
}

/// Check that every line is ready and fully received
pub fn check_submission(items: &[PurchaseItem]) -> Result<(), WorkflowError> {
    if items.is_empty() {
        return Err(WorkflowError::EmptyPurchase);
    }

    let item_ids: Vec<Uuid> = items
        .iter()
        .filter(|item| !item.is_fully_received())
        .map(|item| item.id)
        .collect();

    if item_ids.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::NotFullyReceived { item_ids })
    }
}
