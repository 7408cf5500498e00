//! HTTP handlers for material stock lookups

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{Material, MaterialPrice};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::CatalogService;
use crate::AppState;

/// Query parameters for listing materials
#[derive(Debug, Default, Deserialize)]
pub struct MaterialListQuery {
    #[serde(default)]
    pub low_stock: bool,
}

/// Material with its price tiers
#[derive(Debug, Serialize)]
pub struct MaterialDetails {
    #[serde(flatten)]
    pub material: Material,
    pub is_low_stock: bool,
    pub prices: Vec<MaterialPrice>,
}

/// List materials with their on-hand quantities
pub async fn list_materials(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<MaterialListQuery>,
) -> AppResult<Json<Vec<Material>>> {
    current_user.require("materials", "read")?;

    let service = CatalogService::new(state.db);
    let materials = service.list_materials(query.low_stock).await?;
    Ok(Json(materials))
}

/// Get a material with its price tiers
pub async fn get_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<MaterialDetails>> {
    current_user.require("materials", "read")?;

    let service = CatalogService::new(state.db);
    let material = service.get_material(material_id).await?;
    let prices = service.material_prices(material_id).await?;
    Ok(Json(MaterialDetails {
        is_low_stock: material.is_low_stock(),
        material,
        prices,
    }))
}
