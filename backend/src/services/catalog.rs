//! Read-only catalog lookups: suppliers, material items, materials and prices
//!
//! The workflows never write catalog definitions. Connection-level helpers
//! take a `PgConnection` so they can run inside a workflow's transaction.

use std::collections::HashMap;

use shared::{Material, MaterialPrice};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Materials joined with their item definition name
const MATERIAL_SELECT: &str = r#"
    SELECT m.id, m.material_item_id, mi.name, m.thickness, m.width, m.length,
           m.quantity, m.warning_qty, m.created_at, m.updated_at
    FROM materials m
    JOIN material_items mi ON mi.id = m.material_item_id
"#;

/// Catalog service for material listings
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List materials, optionally only those at or below their warning quantity
    pub async fn list_materials(&self, low_stock_only: bool) -> AppResult<Vec<Material>> {
        let query = if low_stock_only {
            format!(
                "{} WHERE m.warning_qty IS NOT NULL AND m.quantity <= m.warning_qty ORDER BY mi.name, m.created_at",
                MATERIAL_SELECT
            )
        } else {
            format!("{} ORDER BY mi.name, m.created_at", MATERIAL_SELECT)
        };

        let materials = sqlx::query_as::<_, Material>(&query)
            .fetch_all(&self.db)
            .await?;

        Ok(materials)
    }

    /// Get a material with its on-hand quantity
    pub async fn get_material(&self, material_id: Uuid) -> AppResult<Material> {
        let mut conn = self.db.acquire().await?;
        find_material(&mut conn, material_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Material".to_string()))
    }

    /// Price tiers of a material, lowest tier first
    pub async fn material_prices(&self, material_id: Uuid) -> AppResult<Vec<MaterialPrice>> {
        let prices = sqlx::query_as::<_, MaterialPrice>(
            r#"
            SELECT id, material_id, tier, price_per_unit
            FROM material_prices
            WHERE material_id = $1
            ORDER BY tier
            "#,
        )
        .bind(material_id)
        .fetch_all(&self.db)
        .await?;

        Ok(prices)
    }
}

pub(crate) async fn supplier_exists(conn: &mut PgConnection, supplier_id: Uuid) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM suppliers WHERE id = $1)")
        .bind(supplier_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

pub(crate) async fn material_item_exists(
    conn: &mut PgConnection,
    material_item_id: Uuid,
) -> AppResult<bool> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM material_items WHERE id = $1)")
            .bind(material_item_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}

pub(crate) async fn find_material(
    conn: &mut PgConnection,
    material_id: Uuid,
) -> AppResult<Option<Material>> {
    let material = sqlx::query_as::<_, Material>(&format!("{} WHERE m.id = $1", MATERIAL_SELECT))
        .bind(material_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(material)
}

/// First available price tier of a material
pub(crate) async fn first_price(
    conn: &mut PgConnection,
    material_id: Uuid,
) -> AppResult<Option<MaterialPrice>> {
    let prices = sqlx::query_as::<_, MaterialPrice>(
        "SELECT id, material_id, tier, price_per_unit FROM material_prices WHERE material_id = $1",
    )
    .bind(material_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(shared::material::first_price_tier(&prices).cloned())
}

/// Current on-hand quantities, without locking
pub(crate) async fn stock_levels(
    conn: &mut PgConnection,
    material_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, i32>> {
    let rows = sqlx::query_as::<_, (Uuid, i32)>(
        "SELECT id, quantity FROM materials WHERE id = ANY($1)",
    )
    .bind(material_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}
