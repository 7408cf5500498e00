//! Common types used across the workflows

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Dimensional attributes of a stocked metal item (millimetres)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Dimensions {
    pub thickness: Option<Decimal>,
    pub width: Option<Decimal>,
    pub length: Option<Decimal>,
}

/// Monetary value of a line: price × quantity
pub fn line_amount(price_per_unit: Decimal, quantity: i32) -> Decimal {
    price_per_unit * Decimal::from(quantity)
}
