//! Material ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Dimensions;

/// A stocked material lot and its on-hand quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Material {
    pub id: Uuid,
    pub material_item_id: Uuid,
    /// Name of the material item definition
    pub name: String,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub dimensions: Dimensions,
    pub quantity: i32,
    /// Low-stock threshold
    pub warning_qty: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// Stock is low once it falls to or below the warning threshold
    pub fn is_low_stock(&self) -> bool {
        self.warning_qty.is_some_and(|threshold| self.quantity <= threshold)
    }
}

/// One price tier of a material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MaterialPrice {
    pub id: Uuid,
    pub material_id: Uuid,
    /// Tier ordinal, lowest first
    pub tier: i32,
    pub price_per_unit: Decimal,
}

/// The first available price tier (lowest ordinal)
pub fn first_price_tier(prices: &[MaterialPrice]) -> Option<&MaterialPrice> {
    prices.iter().min_by_key(|price| price.tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(quantity: i32, warning_qty: Option<i32>) -> Material {
        Material {
            id: Uuid::new_v4(),
            material_item_id: Uuid::new_v4(),
            name: "Sheet AISI 304".to_string(),
            dimensions: Dimensions::default(),
            quantity,
            warning_qty,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn price(tier: i32, cents: i64) -> MaterialPrice {
        MaterialPrice {
            id: Uuid::new_v4(),
            material_id: Uuid::nil(),
            tier,
            price_per_unit: Decimal::new(cents, 2),
        }
    }

    #[test]
    fn test_low_stock_threshold() {
        assert!(material(5, Some(5)).is_low_stock());
        assert!(material(0, Some(1)).is_low_stock());
        assert!(!material(6, Some(5)).is_low_stock());
        assert!(!material(0, None).is_low_stock());
    }

    #[test]
    fn test_first_price_tier_picks_lowest_ordinal() {
        let prices = vec![price(3, 900), price(1, 1200), price(2, 1000)];
        let first = first_price_tier(&prices).unwrap();
        assert_eq!(first.tier, 1);
        assert_eq!(first.price_per_unit, Decimal::new(1200, 2));
    }

    #[test]
    fn test_first_price_tier_empty() {
        assert!(first_price_tier(&[]).is_none());
    }
}
