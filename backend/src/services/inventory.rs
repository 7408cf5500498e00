//! Inventory (stock count) workflow service
//!
//! Creating an inventory snapshots every material's on-hand quantity.
//! Approval overwrites the ledger with the counted quantities.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::{
    inventory, validate_business_number, validate_reason, Inventory, InventoryDetails,
    InventoryItem, InventoryStatus,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::ledger::LockedStock;
use super::RejectInput;
use crate::error::{AppError, AppResult};

/// Inventory service for stock counts
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Input for starting a stock count
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInventoryInput {
    pub inventory_number: String,
    pub inventory_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// Input for recording a counted quantity
#[derive(Debug, Deserialize, Validate)]
pub struct CountItemInput {
    pub actual_quantity: i32,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// Query parameters for listing inventories
#[derive(Debug, Default, Deserialize)]
pub struct InventoryListQuery {
    pub status: Option<InventoryStatus>,
}

impl InventoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Start a stock count with one line per material
    pub async fn create_inventory(
        &self,
        input: CreateInventoryInput,
    ) -> AppResult<InventoryDetails> {
        input.validate()?;
        validate_business_number(&input.inventory_number)
            .map_err(|msg| AppError::validation("inventory_number", msg))?;

        let mut tx = self.db.begin().await?;

        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM inventories WHERE inventory_number = $1)",
        )
        .bind(&input.inventory_number)
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            return Err(AppError::DuplicateEntry("inventory_number".to_string()));
        }

        let inventory = sqlx::query_as::<_, Inventory>(
            r#"
            INSERT INTO inventories (inventory_number, inventory_date, comment)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&input.inventory_number)
        .bind(input.inventory_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(&input.comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_insert(e, "inventory_number"))?;

        // Snapshot of the ledger as seen by this statement
        let snapshot = sqlx::query(
            r#"
            INSERT INTO inventory_items (inventory_id, material_id, system_quantity)
            SELECT $1, id, quantity FROM materials
            "#,
        )
        .bind(inventory.id)
        .execute(&mut *tx)
        .await?;

        let details = load_details(&mut tx, inventory.id).await?;
        tx.commit().await?;

        tracing::info!(
            inventory_id = %inventory.id,
            "inventory {} created with {} materials",
            inventory.inventory_number,
            snapshot.rows_affected()
        );

        Ok(details)
    }

    /// Get an inventory with its lines and discrepancy summary
    pub async fn get_inventory(&self, inventory_id: Uuid) -> AppResult<InventoryDetails> {
        let mut conn = self.db.acquire().await?;
        load_details(&mut conn, inventory_id).await
    }

    /// List inventory headers, newest first
    pub async fn list_inventories(&self, query: InventoryListQuery) -> AppResult<Vec<Inventory>> {
        let inventories = sqlx::query_as::<_, Inventory>(
            r#"
            SELECT * FROM inventories
            WHERE ($1::inventory_status IS NULL OR status = $1)
            ORDER BY inventory_date DESC, created_at DESC
            "#,
        )
        .bind(query.status)
        .fetch_all(&self.db)
        .await?;

        Ok(inventories)
    }

    /// Record the counted quantity of one line
    pub async fn count_item(
        &self,
        inventory_id: Uuid,
        item_id: Uuid,
        input: CountItemInput,
    ) -> AppResult<InventoryDetails> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let inventory = lock_inventory(&mut tx, inventory_id).await?;
        inventory.status.ensure_editable()?;

        let item = sqlx::query_as::<_, InventoryItem>(
            "SELECT * FROM inventory_items WHERE id = $1 AND inventory_id = $2",
        )
        .bind(item_id)
        .bind(inventory_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item".to_string()))?;

        let difference = inventory::record_count(&item, input.actual_quantity)?;

        sqlx::query(
            r#"
            UPDATE inventory_items
            SET actual_quantity = $2, difference = $3, comment = COALESCE($4, comment)
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(input.actual_quantity)
        .bind(difference)
        .bind(&input.comment)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE inventories SET updated_at = NOW() WHERE id = $1")
            .bind(inventory_id)
            .execute(&mut *tx)
            .await?;

        let details = load_details(&mut tx, inventory_id).await?;
        tx.commit().await?;

        Ok(details)
    }

    /// Submit a fully counted inventory for approval
    pub async fn submit_inventory(&self, inventory_id: Uuid) -> AppResult<InventoryDetails> {
        let mut tx = self.db.begin().await?;

        let inventory = lock_inventory(&mut tx, inventory_id).await?;
        inventory.status.ensure_submittable()?;

        let items = load_items(&mut tx, inventory_id).await?;
        inventory::check_submission(&items)?;

        sqlx::query(
            r#"
            UPDATE inventories
            SET status = $2, submitted_at = NOW(), rejected_at = NULL,
                rejection_reason = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(inventory_id)
        .bind(InventoryStatus::Pending)
        .execute(&mut *tx)
        .await?;

        let details = load_details(&mut tx, inventory_id).await?;
        tx.commit().await?;

        tracing::info!(
            inventory_id = %inventory_id,
            "inventory {} submitted ({} mismatched of {})",
            inventory.inventory_number,
            details.summary.mismatched_items,
            details.summary.total_items
        );

        Ok(details)
    }

    /// Approve a pending inventory and overwrite the ledger with its counts
    pub async fn approve_inventory(&self, inventory_id: Uuid) -> AppResult<InventoryDetails> {
        let mut tx = self.db.begin().await?;

        let inventory = lock_inventory(&mut tx, inventory_id).await?;
        inventory.status.ensure_pending()?;

        let items = load_items(&mut tx, inventory_id).await?;
        let targets = inventory::reconciliation_targets(&items);

        let mut stock =
            LockedStock::acquire(&mut tx, targets.iter().map(|(material_id, _)| *material_id))
                .await?;

        // Stock that moved since the snapshot is overwritten all the same
        for item in &items {
            if let Some(current) = stock.quantity(item.material_id) {
                if current != item.system_quantity {
                    tracing::warn!(
                        inventory_id = %inventory_id,
                        material_id = %item.material_id,
                        "material quantity drifted from {} to {} since the count started",
                        item.system_quantity,
                        current
                    );
                }
            }
        }

        for (material_id, actual_quantity) in targets {
            stock.overwrite(&mut tx, material_id, actual_quantity).await?;
        }

        sqlx::query(
            "UPDATE inventories SET status = $2, approved_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(inventory_id)
        .bind(InventoryStatus::Approved)
        .execute(&mut *tx)
        .await?;

        let details = load_details(&mut tx, inventory_id).await?;
        tx.commit().await?;

        tracing::info!(
            inventory_id = %inventory_id,
            "inventory {} approved, {} materials reconciled",
            inventory.inventory_number,
            items.len()
        );

        Ok(details)
    }

    /// Send a pending inventory back to the counters
    pub async fn reject_inventory(
        &self,
        inventory_id: Uuid,
        input: RejectInput,
    ) -> AppResult<InventoryDetails> {
        validate_reason(&input.reason).map_err(|msg| AppError::validation("reason", msg))?;

        let mut tx = self.db.begin().await?;

        let inventory = lock_inventory(&mut tx, inventory_id).await?;
        inventory.status.ensure_pending()?;

        sqlx::query(
            r#"
            UPDATE inventories
            SET status = $2, rejected_at = NOW(), rejection_reason = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(inventory_id)
        .bind(InventoryStatus::Rejected)
        .bind(&input.reason)
        .execute(&mut *tx)
        .await?;

        let details = load_details(&mut tx, inventory_id).await?;
        tx.commit().await?;

        tracing::info!(
            inventory_id = %inventory_id,
            "inventory {} rejected: {}",
            inventory.inventory_number,
            input.reason
        );

        Ok(details)
    }

    /// Delete an inventory that never reached the ledger
    pub async fn delete_inventory(&self, inventory_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let inventory = lock_inventory(&mut tx, inventory_id).await?;
        inventory.status.ensure_removable()?;

        sqlx::query("DELETE FROM inventories WHERE id = $1")
            .bind(inventory_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            inventory_id = %inventory_id,
            "inventory {} deleted",
            inventory.inventory_number
        );

        Ok(())
    }
}

async fn lock_inventory(conn: &mut PgConnection, inventory_id: Uuid) -> AppResult<Inventory> {
    sqlx::query_as::<_, Inventory>("SELECT * FROM inventories WHERE id = $1 FOR UPDATE")
        .bind(inventory_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory".to_string()))
}

async fn load_items(conn: &mut PgConnection, inventory_id: Uuid) -> AppResult<Vec<InventoryItem>> {
    let items = sqlx::query_as::<_, InventoryItem>(
        r#"
        SELECT ii.* FROM inventory_items ii
        JOIN materials m ON m.id = ii.material_id
        JOIN material_items mi ON mi.id = m.material_item_id
        WHERE ii.inventory_id = $1
        ORDER BY mi.name, m.created_at, ii.id
        "#,
    )
    .bind(inventory_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn load_details(conn: &mut PgConnection, inventory_id: Uuid) -> AppResult<InventoryDetails> {
    let inventory = sqlx::query_as::<_, Inventory>("SELECT * FROM inventories WHERE id = $1")
        .bind(inventory_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory".to_string()))?;
    let items = load_items(conn, inventory_id).await?;
    Ok(InventoryDetails::new(inventory, items))
}
