//! Write-off workflow service
//!
//! Write-offs remove damaged, consumed or disposed stock. Stock sufficiency
//! is checked when lines change and at submission, and again under row
//! locks at approval, since other write-offs may have completed meanwhile.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    line_amount, validate_business_number, validate_reason, write_off, WriteOff, WriteOffDetails,
    WriteOffItem, WriteOffStatus,
};
use sqlx::{PgConnection, PgPool};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;
use validator::Validate;

use super::catalog;
use super::ledger::LockedStock;
use super::RejectInput;
use crate::error::{AppError, AppResult};

/// Write-off service for removing stock
#[derive(Clone)]
pub struct WriteOffService {
    db: PgPool,
}

/// Input for opening a write-off
#[derive(Debug, Deserialize, Validate)]
pub struct CreateWriteOffInput {
    pub write_off_number: String,
    pub write_off_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// Input for a new write-off line
#[derive(Debug, Deserialize, Validate)]
pub struct WriteOffItemInput {
    pub material_id: Uuid,
    pub quantity: i32,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// Input for editing a write-off line
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateWriteOffItemInput {
    pub quantity: i32,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// Query parameters for listing write-offs
#[derive(Debug, Default, Deserialize)]
pub struct WriteOffListQuery {
    pub status: Option<WriteOffStatus>,
}

impl WriteOffService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open an empty draft write-off
    pub async fn create_write_off(&self, input: CreateWriteOffInput) -> AppResult<WriteOffDetails> {
        input.validate()?;
        validate_business_number(&input.write_off_number)
            .map_err(|msg| AppError::validation("write_off_number", msg))?;

        let mut tx = self.db.begin().await?;

        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM write_offs WHERE write_off_number = $1)",
        )
        .bind(&input.write_off_number)
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            return Err(AppError::DuplicateEntry("write_off_number".to_string()));
        }

        let write_off = sqlx::query_as::<_, WriteOff>(
            r#"
            INSERT INTO write_offs (write_off_number, write_off_date, reason)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&input.write_off_number)
        .bind(input.write_off_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(&input.reason)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_insert(e, "write_off_number"))?;

        tx.commit().await?;

        tracing::info!(
            write_off_id = %write_off.id,
            "write-off {} created",
            write_off.write_off_number
        );

        Ok(WriteOffDetails {
            write_off,
            items: Vec::new(),
        })
    }

    /// Get a write-off with its lines
    pub async fn get_write_off(&self, write_off_id: Uuid) -> AppResult<WriteOffDetails> {
        let mut conn = self.db.acquire().await?;
        load_details(&mut conn, write_off_id).await
    }

    /// List write-off headers, newest first
    pub async fn list_write_offs(&self, query: WriteOffListQuery) -> AppResult<Vec<WriteOff>> {
        let write_offs = sqlx::query_as::<_, WriteOff>(
            r#"
            SELECT * FROM write_offs
            WHERE ($1::write_off_status IS NULL OR status = $1)
            ORDER BY write_off_date DESC, created_at DESC
            "#,
        )
        .bind(query.status)
        .fetch_all(&self.db)
        .await?;

        Ok(write_offs)
    }

    /// Add a line; the price is captured from the material's first price tier
    pub async fn add_item(
        &self,
        write_off_id: Uuid,
        input: WriteOffItemInput,
    ) -> AppResult<WriteOffDetails> {
        input.validate()?;
        write_off::validate_quantity(input.quantity)?;

        let mut tx = self.db.begin().await?;

        let header = lock_write_off(&mut tx, write_off_id).await?;
        header.status.ensure_draft_items()?;

        let material = catalog::find_material(&mut tx, input.material_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

        let items = load_items(&mut tx, write_off_id).await?;
        let demand = write_off::planned_demand(&items, None, material.id, input.quantity);
        write_off::check_stock(
            &BTreeMap::from([(material.id, demand)]),
            &HashMap::from([(material.id, material.quantity)]),
        )?;

        let price_per_unit = match catalog::first_price(&mut tx, material.id).await? {
            Some(price) => price.price_per_unit,
            None => {
                tracing::warn!(
                    material_id = %material.id,
                    "material has no price tier, writing off at zero value"
                );
                Decimal::ZERO
            }
        };

        sqlx::query(
            r#"
            INSERT INTO write_off_items (write_off_id, material_id, quantity, price_per_unit, amount, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(write_off_id)
        .bind(material.id)
        .bind(input.quantity)
        .bind(price_per_unit)
        .bind(line_amount(price_per_unit, input.quantity))
        .bind(&input.comment)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::from_amount(e, "amount"))?;

        refresh_totals(&mut tx, write_off_id).await?;

        let details = load_details(&mut tx, write_off_id).await?;
        tx.commit().await?;

        Ok(details)
    }

    /// Change the quantity of a line; the captured price is kept
    pub async fn update_item(
        &self,
        write_off_id: Uuid,
        item_id: Uuid,
        input: UpdateWriteOffItemInput,
    ) -> AppResult<WriteOffDetails> {
        input.validate()?;
        write_off::validate_quantity(input.quantity)?;

        let mut tx = self.db.begin().await?;

        let header = lock_write_off(&mut tx, write_off_id).await?;
        header.status.ensure_draft_items()?;

        let items = load_items(&mut tx, write_off_id).await?;
        let item = items
            .iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| AppError::NotFound("Write-off item".to_string()))?;

        let material = catalog::find_material(&mut tx, item.material_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

        let demand = write_off::planned_demand(&items, Some(item.id), material.id, input.quantity);
        write_off::check_stock(
            &BTreeMap::from([(material.id, demand)]),
            &HashMap::from([(material.id, material.quantity)]),
        )?;

        sqlx::query(
            r#"
            UPDATE write_off_items
            SET quantity = $2, amount = $3, comment = COALESCE($4, comment)
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(input.quantity)
        .bind(line_amount(item.price_per_unit, input.quantity))
        .bind(&input.comment)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::from_amount(e, "amount"))?;

        refresh_totals(&mut tx, write_off_id).await?;

        let details = load_details(&mut tx, write_off_id).await?;
        tx.commit().await?;

        Ok(details)
    }

    /// Remove a line from a draft
    pub async fn remove_item(&self, write_off_id: Uuid, item_id: Uuid) -> AppResult<WriteOffDetails> {
        let mut tx = self.db.begin().await?;

        let header = lock_write_off(&mut tx, write_off_id).await?;
        header.status.ensure_draft_items()?;

        let result = sqlx::query("DELETE FROM write_off_items WHERE id = $1 AND write_off_id = $2")
            .bind(item_id)
            .bind(write_off_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Write-off item".to_string()));
        }

        refresh_totals(&mut tx, write_off_id).await?;

        let details = load_details(&mut tx, write_off_id).await?;
        tx.commit().await?;

        Ok(details)
    }

    /// Submit a draft for approval once its stock is available
    pub async fn submit_write_off(&self, write_off_id: Uuid) -> AppResult<WriteOffDetails> {
        let mut tx = self.db.begin().await?;

        let header = lock_write_off(&mut tx, write_off_id).await?;
        header.status.ensure_draft()?;

        let items = load_items(&mut tx, write_off_id).await?;
        write_off::check_has_quantity(&items)?;

        let demand = write_off::demand_by_material(&items);
        let material_ids: Vec<Uuid> = demand.keys().copied().collect();
        let stock = catalog::stock_levels(&mut tx, &material_ids).await?;
        write_off::check_stock(&demand, &stock)?;

        sqlx::query(
            r#"
            UPDATE write_offs
            SET status = $2, submitted_at = NOW(), rejected_at = NULL,
                rejection_reason = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(write_off_id)
        .bind(WriteOffStatus::Pending)
        .execute(&mut *tx)
        .await?;

        let details = load_details(&mut tx, write_off_id).await?;
        tx.commit().await?;

        tracing::info!(
            write_off_id = %write_off_id,
            "write-off {} submitted",
            header.write_off_number
        );

        Ok(details)
    }

    /// Approve a pending write-off and remove its quantities from stock.
    ///
    /// Stock is re-checked under row locks; when any material falls short
    /// nothing is written and every shortfall is reported.
    pub async fn approve_write_off(&self, write_off_id: Uuid) -> AppResult<WriteOffDetails> {
        let mut tx = self.db.begin().await?;

        let header = lock_write_off(&mut tx, write_off_id).await?;
        header.status.ensure_pending()?;

        let items = load_items(&mut tx, write_off_id).await?;
        let demand = write_off::demand_by_material(&items);

        let mut stock = LockedStock::acquire(&mut tx, demand.keys().copied()).await?;
        write_off::check_stock(&demand, stock.quantities())?;

        for (&material_id, &quantity) in &demand {
            // demand never exceeds the locked i32 quantity at this point
            let quantity = i32::try_from(quantity).map_err(|_| {
                AppError::Internal(format!("write-off quantity {} out of range", quantity))
            })?;
            stock.decrement(&mut tx, material_id, quantity).await?;
        }

        sqlx::query(
            "UPDATE write_offs SET status = $2, completed_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(write_off_id)
        .bind(WriteOffStatus::Completed)
        .execute(&mut *tx)
        .await?;

        let details = load_details(&mut tx, write_off_id).await?;
        tx.commit().await?;

        tracing::info!(
            write_off_id = %write_off_id,
            "write-off {} completed, {} units of {} materials removed",
            header.write_off_number,
            details.write_off.total_quantity,
            demand.len()
        );

        Ok(details)
    }

    /// Return a pending write-off to draft
    pub async fn reject_write_off(
        &self,
        write_off_id: Uuid,
        input: RejectInput,
    ) -> AppResult<WriteOffDetails> {
        validate_reason(&input.reason).map_err(|msg| AppError::validation("reason", msg))?;

        let mut tx = self.db.begin().await?;

        let header = lock_write_off(&mut tx, write_off_id).await?;
        header.status.ensure_pending()?;

        sqlx::query(
            r#"
            UPDATE write_offs
            SET status = $2, submitted_at = NULL, rejected_at = NOW(),
                rejection_reason = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(write_off_id)
        .bind(WriteOffStatus::Draft)
        .bind(&input.reason)
        .execute(&mut *tx)
        .await?;

        let details = load_details(&mut tx, write_off_id).await?;
        tx.commit().await?;

        tracing::info!(
            write_off_id = %write_off_id,
            "write-off {} rejected: {}",
            header.write_off_number,
            input.reason
        );

        Ok(details)
    }

    /// Delete a draft write-off
    pub async fn delete_write_off(&self, write_off_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let header = lock_write_off(&mut tx, write_off_id).await?;
        header.status.ensure_draft()?;

        sqlx::query("DELETE FROM write_offs WHERE id = $1")
            .bind(write_off_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            write_off_id = %write_off_id,
            "write-off {} deleted",
            header.write_off_number
        );

        Ok(())
    }
}

async fn lock_write_off(conn: &mut PgConnection, write_off_id: Uuid) -> AppResult<WriteOff> {
    sqlx::query_as::<_, WriteOff>("SELECT * FROM write_offs WHERE id = $1 FOR UPDATE")
        .bind(write_off_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Write-off".to_string()))
}

async fn load_items(conn: &mut PgConnection, write_off_id: Uuid) -> AppResult<Vec<WriteOffItem>> {
    let items = sqlx::query_as::<_, WriteOffItem>(
        "SELECT * FROM write_off_items WHERE write_off_id = $1 ORDER BY created_at, id",
    )
    .bind(write_off_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn load_details(conn: &mut PgConnection, write_off_id: Uuid) -> AppResult<WriteOffDetails> {
    let write_off = sqlx::query_as::<_, WriteOff>("SELECT * FROM write_offs WHERE id = $1")
        .bind(write_off_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Write-off".to_string()))?;
    let items = load_items(conn, write_off_id).await?;
    Ok(WriteOffDetails { write_off, items })
}

/// Recompute total quantity and amount from the lines
async fn refresh_totals(conn: &mut PgConnection, write_off_id: Uuid) -> AppResult<()> {
    let items = load_items(conn, write_off_id).await?;
    let totals = write_off::recalculate_totals(&items);

    sqlx::query(
        "UPDATE write_offs SET total_quantity = $2, total_amount = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(write_off_id)
    .bind(totals.total_quantity)
    .bind(totals.total_amount)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::from_amount(e, "total_amount"))?;

    Ok(())
}
