//! Material quantity ledger
//!
//! `materials.quantity` is written in exactly three places: a purchase
//! submission opens new lots, an inventory approval overwrites counted
//! quantities and a write-off approval decrements them. Everything here is
//! `pub(super)` so only the workflow services can reach it, and always
//! inside the caller's transaction.
//!
//! Overwrites and decrements go through [`LockedStock`], which holds the row
//! locks taken with `SELECT ... FOR UPDATE`. Rows are locked in ascending id
//! order so two terminal transitions over overlapping materials queue up
//! instead of deadlocking.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use shared::{Dimensions, StockShortfall, WorkflowError};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A lot created from a received purchase line
pub(super) struct NewLot<'a> {
    pub material_item_id: Uuid,
    pub dimensions: &'a Dimensions,
    pub quantity: i32,
    pub price_per_unit: Decimal,
}

/// Insert a new material row for a received purchase line.
/// Lots are never merged into an existing material of the same item.
pub(super) async fn open_lot(conn: &mut PgConnection, lot: &NewLot<'_>) -> AppResult<Uuid> {
    let material_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO materials (material_item_id, thickness, width, length, quantity)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(lot.material_item_id)
    .bind(lot.dimensions.thickness)
    .bind(lot.dimensions.width)
    .bind(lot.dimensions.length)
    .bind(lot.quantity)
    .fetch_one(&mut *conn)
    .await?;

    // The purchase price becomes the lot's first price tier
    sqlx::query("INSERT INTO material_prices (material_id, tier, price_per_unit) VALUES ($1, 1, $2)")
        .bind(material_id)
        .bind(lot.price_per_unit)
        .execute(&mut *conn)
        .await?;

    Ok(material_id)
}

/// Material rows locked until the surrounding transaction ends
pub(super) struct LockedStock {
    quantities: HashMap<Uuid, i32>,
}

impl LockedStock {
    /// Lock every listed material. Fails with `NotFound` if one is missing.
    pub(super) async fn acquire(
        conn: &mut PgConnection,
        material_ids: impl IntoIterator<Item = Uuid>,
    ) -> AppResult<Self> {
        let ids: Vec<Uuid> = material_ids
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if ids.is_empty() {
            return Ok(Self {
                quantities: HashMap::new(),
            });
        }

        let rows = sqlx::query_as::<_, (Uuid, i32)>(
            "SELECT id, quantity FROM materials WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        if rows.len() != ids.len() {
            return Err(AppError::NotFound("Material".to_string()));
        }

        tracing::debug!("locked {} material rows", rows.len());

        Ok(Self {
            quantities: rows.into_iter().collect(),
        })
    }

    pub(super) fn quantities(&self) -> &HashMap<Uuid, i32> {
        &self.quantities
    }

    pub(super) fn quantity(&self, material_id: Uuid) -> Option<i32> {
        self.quantities.get(&material_id).copied()
    }

    /// Replace the on-hand quantity; returns the quantity it replaced
    pub(super) async fn overwrite(
        &mut self,
        conn: &mut PgConnection,
        material_id: Uuid,
        quantity: i32,
    ) -> AppResult<i32> {
        let previous = self.locked(material_id)?;
        if quantity < 0 {
            return Err(WorkflowError::NegativeQuantity { field: "quantity" }.into());
        }

        sqlx::query("UPDATE materials SET quantity = $2, updated_at = NOW() WHERE id = $1")
            .bind(material_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;

        self.quantities.insert(material_id, quantity);
        Ok(previous)
    }

    /// Remove `quantity` units; returns the remaining quantity
    pub(super) async fn decrement(
        &mut self,
        conn: &mut PgConnection,
        material_id: Uuid,
        quantity: i32,
    ) -> AppResult<i32> {
        let available = self.locked(material_id)?;
        if quantity < 0 {
            return Err(WorkflowError::NegativeQuantity { field: "quantity" }.into());
        }
        if quantity > available {
            return Err(WorkflowError::InsufficientStock {
                shortfalls: vec![StockShortfall {
                    material_id,
                    requested: i64::from(quantity),
                    available,
                }],
            }
            .into());
        }

        let remaining = sqlx::query_scalar::<_, i32>(
            "UPDATE materials SET quantity = quantity - $2, updated_at = NOW() WHERE id = $1 RETURNING quantity",
        )
        .bind(material_id)
        .bind(quantity)
        .fetch_one(&mut *conn)
        .await?;

        self.quantities.insert(material_id, remaining);
        Ok(remaining)
    }

    fn locked(&self, material_id: Uuid) -> AppResult<i32> {
        self.quantity(material_id).ok_or_else(|| {
            AppError::Internal(format!("material {} written without a row lock", material_id))
        })
    }
}
