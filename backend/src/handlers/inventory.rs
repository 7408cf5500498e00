//! HTTP handlers for inventory (stock count) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Inventory, InventoryDetails};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::{CountItemInput, CreateInventoryInput, InventoryListQuery};
use crate::services::{InventoryService, RejectInput};
use crate::AppState;

/// Start a stock count
pub async fn create_inventory(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateInventoryInput>,
) -> AppResult<(StatusCode, Json<InventoryDetails>)> {
    current_user.require("inventories", "write")?;

    let service = InventoryService::new(state.db);
    let inventory = service.create_inventory(input).await?;
    Ok((StatusCode::CREATED, Json(inventory)))
}

/// List inventories
pub async fn list_inventories(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<InventoryListQuery>,
) -> AppResult<Json<Vec<Inventory>>> {
    current_user.require("inventories", "read")?;

    let service = InventoryService::new(state.db);
    let inventories = service.list_inventories(query).await?;
    Ok(Json(inventories))
}

/// Get an inventory with its lines and discrepancy summary
pub async fn get_inventory(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inventory_id): Path<Uuid>,
) -> AppResult<Json<InventoryDetails>> {
    current_user.require("inventories", "read")?;

    let service = InventoryService::new(state.db);
    let inventory = service.get_inventory(inventory_id).await?;
    Ok(Json(inventory))
}

/// Delete an inventory that was not approved
pub async fn delete_inventory(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inventory_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require("inventories", "write")?;

    let service = InventoryService::new(state.db);
    service.delete_inventory(inventory_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record a counted quantity
pub async fn count_inventory_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((inventory_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<CountItemInput>,
) -> AppResult<Json<InventoryDetails>> {
    current_user.require("inventories", "write")?;

    let service = InventoryService::new(state.db);
    let inventory = service.count_item(inventory_id, item_id, input).await?;
    Ok(Json(inventory))
}

/// Submit a counted inventory for approval
pub async fn submit_inventory(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inventory_id): Path<Uuid>,
) -> AppResult<Json<InventoryDetails>> {
    current_user.require("inventories", "write")?;

    let service = InventoryService::new(state.db);
    let inventory = service.submit_inventory(inventory_id).await?;
    Ok(Json(inventory))
}

/// Approve an inventory and reconcile stock
pub async fn approve_inventory(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inventory_id): Path<Uuid>,
) -> AppResult<Json<InventoryDetails>> {
    current_user.require("inventories", "approve")?;

    let service = InventoryService::new(state.db);
    let inventory = service.approve_inventory(inventory_id).await?;
    Ok(Json(inventory))
}

/// Reject an inventory with a reason
pub async fn reject_inventory(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(inventory_id): Path<Uuid>,
    Json(input): Json<RejectInput>,
) -> AppResult<Json<InventoryDetails>> {
    current_user.require("inventories", "approve")?;

    let service = InventoryService::new(state.db);
    let inventory = service.reject_inventory(inventory_id, input).await?;
    Ok(Json(inventory))
}
