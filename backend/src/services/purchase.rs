//! Purchase workflow service
//!
//! Purchases record incoming stock. Lines are received at the gate while the
//! purchase is open; submitting a fully received purchase turns every line
//! into a new material lot and moves the purchase to `RECEIVED`.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    purchase, validate_business_number, Dimensions, OpenPurchaseStatus, Purchase,
    PurchaseDetails, PurchaseItem, PurchaseItemStatus, PurchaseStatus,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::catalog;
use super::ledger::{self, NewLot};
use crate::error::{AppError, AppResult};

/// Purchase service for managing purchase orders and receiving
#[derive(Clone)]
pub struct PurchaseService {
    db: PgPool,
}

/// Input for creating a purchase
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseInput {
    pub purchase_number: String,
    pub supplier_id: Uuid,
    pub purchase_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
    #[serde(default)]
    pub items: Vec<PurchaseItemInput>,
}

/// Input for a new purchase line
#[derive(Debug, Deserialize, Validate)]
pub struct PurchaseItemInput {
    pub material_item_id: Uuid,
    #[validate(range(min = 1))]
    pub ordered_quantity: i32,
    pub price_per_unit: Decimal,
    #[serde(flatten)]
    pub dimensions: Dimensions,
}

/// Input for editing a purchase line; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePurchaseItemInput {
    #[validate(range(min = 1))]
    pub ordered_quantity: Option<i32>,
    pub price_per_unit: Option<Decimal>,
    pub thickness: Option<Decimal>,
    pub width: Option<Decimal>,
    pub length: Option<Decimal>,
}

/// Input for the generic status update
#[derive(Debug, Deserialize)]
pub struct UpdatePurchaseStatusInput {
    pub status: PurchaseStatus,
}

/// Input for recording goods received at the gate
#[derive(Debug, Deserialize)]
pub struct ReceiveItemInput {
    pub received_quantity: i32,
}

/// Query parameters for listing purchases
#[derive(Debug, Default, Deserialize)]
pub struct PurchaseListQuery {
    pub status: Option<PurchaseStatus>,
}

impl PurchaseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a purchase, optionally with its first lines
    pub async fn create_purchase(&self, input: CreatePurchaseInput) -> AppResult<PurchaseDetails> {
        input.validate()?;
        validate_business_number(&input.purchase_number)
            .map_err(|msg| AppError::validation("purchase_number", msg))?;
        for item in &input.items {
            validate_item(item)?;
        }

        let mut tx = self.db.begin().await?;

        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM purchases WHERE purchase_number = $1)",
        )
        .bind(&input.purchase_number)
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            return Err(AppError::DuplicateEntry("purchase_number".to_string()));
        }

        if !catalog::supplier_exists(&mut tx, input.supplier_id).await? {
            return Err(AppError::NotFound("Supplier".to_string()));
        }

        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            INSERT INTO purchases (purchase_number, supplier_id, purchase_date, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&input.purchase_number)
        .bind(input.supplier_id)
        .bind(input.purchase_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(&input.comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_insert(e, "purchase_number"))?;

        for item in &input.items {
            insert_item(&mut tx, purchase.id, item).await?;
        }
        refresh_total(&mut tx, purchase.id).await?;

        let details = load_details(&mut tx, purchase.id).await?;
        tx.commit().await?;

        tracing::info!(
            purchase_id = %purchase.id,
            "purchase {} created with {} items",
            purchase.purchase_number,
            details.items.len()
        );

        Ok(details)
    }

    /// Get a purchase with its lines
    pub async fn get_purchase(&self, purchase_id: Uuid) -> AppResult<PurchaseDetails> {
        let mut conn = self.db.acquire().await?;
        load_details(&mut conn, purchase_id).await
    }

    /// List purchase headers, newest first
    pub async fn list_purchases(&self, query: PurchaseListQuery) -> AppResult<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT * FROM purchases
            WHERE ($1::purchase_status IS NULL OR status = $1)
            ORDER BY purchase_date DESC, created_at DESC
            "#,
        )
        .bind(query.status)
        .fetch_all(&self.db)
        .await?;

        Ok(purchases)
    }

    /// Move an open purchase to another open status
    pub async fn update_status(
        &self,
        purchase_id: Uuid,
        status: OpenPurchaseStatus,
    ) -> AppResult<PurchaseDetails> {
        let mut tx = self.db.begin().await?;

        let purchase = lock_purchase(&mut tx, purchase_id).await?;
        purchase.status.ensure_open()?;
        let target = PurchaseStatus::from(status);

        sqlx::query("UPDATE purchases SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(purchase_id)
            .bind(target)
            .execute(&mut *tx)
            .await?;

        let details = load_details(&mut tx, purchase_id).await?;
        tx.commit().await?;

        tracing::info!(
            purchase_id = %purchase_id,
            "purchase status {} -> {}",
            purchase.status,
            target
        );

        Ok(details)
    }

    /// Add a line to a purchase that has not been received
    pub async fn add_item(
        &self,
        purchase_id: Uuid,
        input: PurchaseItemInput,
    ) -> AppResult<PurchaseDetails> {
        validate_item(&input)?;

        let mut tx = self.db.begin().await?;

        let purchase = lock_purchase(&mut tx, purchase_id).await?;
        purchase.status.ensure_editable()?;

        insert_item(&mut tx, purchase_id, &input).await?;
        refresh_total(&mut tx, purchase_id).await?;

        let details = load_details(&mut tx, purchase_id).await?;
        tx.commit().await?;

        Ok(details)
    }

    /// Edit quantity, price or dimensions of a line
    pub async fn update_item(
        &self,
        purchase_id: Uuid,
        item_id: Uuid,
        input: UpdatePurchaseItemInput,
    ) -> AppResult<PurchaseDetails> {
        input.validate()?;
        if let Some(price) = input.price_per_unit {
            validate_price(price)?;
        }

        let mut tx = self.db.begin().await?;

        let purchase = lock_purchase(&mut tx, purchase_id).await?;
        purchase.status.ensure_editable()?;

        let item = find_item(&mut tx, purchase_id, item_id).await?;
        if let Some(ordered_quantity) = input.ordered_quantity {
            purchase::reorder_quantity(&item, ordered_quantity)?;
        }

        sqlx::query(
            r#"
            UPDATE purchase_items SET
                ordered_quantity = COALESCE($2, ordered_quantity),
                price_per_unit = COALESCE($3, price_per_unit),
                thickness = COALESCE($4, thickness),
                width = COALESCE($5, width),
                length = COALESCE($6, length)
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(input.ordered_quantity)
        .bind(input.price_per_unit)
        .bind(input.thickness)
        .bind(input.width)
        .bind(input.length)
        .execute(&mut *tx)
        .await?;

        refresh_total(&mut tx, purchase_id).await?;

        let details = load_details(&mut tx, purchase_id).await?;
        tx.commit().await?;

        Ok(details)
    }

    /// Record the absolute quantity received for a line
    pub async fn receive_item(
        &self,
        purchase_id: Uuid,
        item_id: Uuid,
        input: ReceiveItemInput,
    ) -> AppResult<PurchaseDetails> {
        let mut tx = self.db.begin().await?;

        let purchase = lock_purchase(&mut tx, purchase_id).await?;
        purchase.status.ensure_editable()?;

        let item = find_item(&mut tx, purchase_id, item_id).await?;
        let status = purchase::receive_quantity(&item, input.received_quantity)?;

        sqlx::query("UPDATE purchase_items SET received_quantity = $2, status = $3 WHERE id = $1")
            .bind(item_id)
            .bind(input.received_quantity)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        touch(&mut tx, purchase_id).await?;

        let details = load_details(&mut tx, purchase_id).await?;
        tx.commit().await?;

        tracing::debug!(
            purchase_id = %purchase_id,
            item_id = %item_id,
            "received {}/{} ({})",
            input.received_quantity,
            item.ordered_quantity,
            status.as_str()
        );

        Ok(details)
    }

    /// Remove a line from a purchase that has not been received
    pub async fn remove_item(&self, purchase_id: Uuid, item_id: Uuid) -> AppResult<PurchaseDetails> {
        let mut tx = self.db.begin().await?;

        let purchase = lock_purchase(&mut tx, purchase_id).await?;
        purchase.status.ensure_editable()?;

        let result = sqlx::query("DELETE FROM purchase_items WHERE id = $1 AND purchase_id = $2")
            .bind(item_id)
            .bind(purchase_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Purchase item".to_string()));
        }

        refresh_total(&mut tx, purchase_id).await?;

        let details = load_details(&mut tx, purchase_id).await?;
        tx.commit().await?;

        Ok(details)
    }

    /// Receive the purchase into stock.
    ///
    /// Every line must be `READY` with its full ordered quantity received.
    /// Each line opens a new material lot carrying the line's dimensions,
    /// received quantity and price as first price tier.
    pub async fn submit_purchase(&self, purchase_id: Uuid) -> AppResult<PurchaseDetails> {
        let mut tx = self.db.begin().await?;

        let purchase = lock_purchase(&mut tx, purchase_id).await?;
        purchase.status.ensure_open()?;

        let items = load_items(&mut tx, purchase_id).await?;
        purchase::check_submission(&items)?;

        for item in &items {
            let material_id = ledger::open_lot(
                &mut tx,
                &NewLot {
                    material_item_id: item.material_item_id,
                    dimensions: &item.dimensions,
                    quantity: item.received_quantity,
                    price_per_unit: item.price_per_unit,
                },
            )
            .await?;

            sqlx::query("UPDATE purchase_items SET status = $2, material_id = $3 WHERE id = $1")
                .bind(item.id)
                .bind(PurchaseItemStatus::Received)
                .bind(material_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "UPDATE purchases SET status = $2, received_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(purchase_id)
        .bind(PurchaseStatus::Received)
        .execute(&mut *tx)
        .await?;

        let details = load_details(&mut tx, purchase_id).await?;
        tx.commit().await?;

        tracing::info!(
            purchase_id = %purchase_id,
            "purchase {} received, {} material lots opened",
            purchase.purchase_number,
            items.len()
        );

        Ok(details)
    }

    /// Delete a purchase that has not been received
    pub async fn delete_purchase(&self, purchase_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let purchase = lock_purchase(&mut tx, purchase_id).await?;
        purchase.status.ensure_open()?;

        sqlx::query("DELETE FROM purchases WHERE id = $1")
            .bind(purchase_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(purchase_id = %purchase_id, "purchase {} deleted", purchase.purchase_number);

        Ok(())
    }
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price.is_sign_negative() {
        return Err(AppError::validation(
            "price_per_unit",
            "Price per unit must not be negative",
        ));
    }
    // price columns are NUMERIC(14, 2)
    if price >= Decimal::new(1_000_000_000_000, 0) {
        return Err(AppError::validation(
            "price_per_unit",
            "Price per unit must be below 1000000000000",
        ));
    }
    Ok(())
}

fn validate_item(item: &PurchaseItemInput) -> AppResult<()> {
    item.validate()?;
    validate_price(item.price_per_unit)
}

async fn lock_purchase(conn: &mut PgConnection, purchase_id: Uuid) -> AppResult<Purchase> {
    sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1 FOR UPDATE")
        .bind(purchase_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase".to_string()))
}

async fn load_items(conn: &mut PgConnection, purchase_id: Uuid) -> AppResult<Vec<PurchaseItem>> {
    let items = sqlx::query_as::<_, PurchaseItem>(
        "SELECT * FROM purchase_items WHERE purchase_id = $1 ORDER BY created_at, id",
    )
    .bind(purchase_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn find_item(
    conn: &mut PgConnection,
    purchase_id: Uuid,
    item_id: Uuid,
) -> AppResult<PurchaseItem> {
    sqlx::query_as::<_, PurchaseItem>(
        "SELECT * FROM purchase_items WHERE id = $1 AND purchase_id = $2",
    )
    .bind(item_id)
    .bind(purchase_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Purchase item".to_string()))
}

async fn load_details(conn: &mut PgConnection, purchase_id: Uuid) -> AppResult<PurchaseDetails> {
    let purchase = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1")
        .bind(purchase_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;
    let items = load_items(conn, purchase_id).await?;
    Ok(PurchaseDetails { purchase, items })
}

async fn insert_item(
    conn: &mut PgConnection,
    purchase_id: Uuid,
    item: &PurchaseItemInput,
) -> AppResult<()> {
    if !catalog::material_item_exists(conn, item.material_item_id).await? {
        return Err(AppError::NotFound("Material item".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO purchase_items
            (purchase_id, material_item_id, ordered_quantity, price_per_unit, thickness, width, length)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(purchase_id)
    .bind(item.material_item_id)
    .bind(item.ordered_quantity)
    .bind(item.price_per_unit)
    .bind(item.dimensions.thickness)
    .bind(item.dimensions.width)
    .bind(item.dimensions.length)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Recompute the purchase total from its lines
async fn refresh_total(conn: &mut PgConnection, purchase_id: Uuid) -> AppResult<Decimal> {
    let items = load_items(conn, purchase_id).await?;
    let total = purchase::total_amount(&items);

    sqlx::query("UPDATE purchases SET total_amount = $2, updated_at = NOW() WHERE id = $1")
        .bind(purchase_id)
        .bind(total)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::from_amount(e, "total_amount"))?;

    Ok(total)
}

async fn touch(conn: &mut PgConnection, purchase_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE purchases SET updated_at = NOW() WHERE id = $1")
        .bind(purchase_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
