//! HTTP handlers for purchase endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{OpenPurchaseStatus, Purchase, PurchaseDetails};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::purchase::{
    CreatePurchaseInput, PurchaseItemInput, PurchaseListQuery, ReceiveItemInput,
    UpdatePurchaseItemInput, UpdatePurchaseStatusInput,
};
use crate::services::PurchaseService;
use crate::AppState;

/// Create a purchase
pub async fn create_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseInput>,
) -> AppResult<(StatusCode, Json<PurchaseDetails>)> {
    current_user.require("purchases", "write")?;

    let service = PurchaseService::new(state.db);
    let purchase = service.create_purchase(input).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

/// List purchases, optionally filtered by status
pub async fn list_purchases(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PurchaseListQuery>,
) -> AppResult<Json<Vec<Purchase>>> {
    current_user.require("purchases", "read")?;

    let service = PurchaseService::new(state.db);
    let purchases = service.list_purchases(query).await?;
    Ok(Json(purchases))
}

/// Get a purchase with its lines
pub async fn get_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<Json<PurchaseDetails>> {
    current_user.require("purchases", "read")?;

    let service = PurchaseService::new(state.db);
    let purchase = service.get_purchase(purchase_id).await?;
    Ok(Json(purchase))
}

/// Change the status of an open purchase.
/// `RECEIVED` is only reachable through submission and is refused here.
pub async fn update_purchase_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseStatusInput>,
) -> AppResult<Json<PurchaseDetails>> {
    current_user.require("purchases", "write")?;
    let status = OpenPurchaseStatus::try_from(input.status)?;

    let service = PurchaseService::new(state.db);
    let purchase = service.update_status(purchase_id, status).await?;
    Ok(Json(purchase))
}

/// Delete a purchase that has not been received
pub async fn delete_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require("purchases", "write")?;

    let service = PurchaseService::new(state.db);
    service.delete_purchase(purchase_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a line to a purchase
pub async fn add_purchase_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
    Json(input): Json<PurchaseItemInput>,
) -> AppResult<Json<PurchaseDetails>> {
    current_user.require("purchases", "write")?;

    let service = PurchaseService::new(state.db);
    let purchase = service.add_item(purchase_id, input).await?;
    Ok(Json(purchase))
}

/// Edit a purchase line
pub async fn update_purchase_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((purchase_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdatePurchaseItemInput>,
) -> AppResult<Json<PurchaseDetails>> {
    current_user.require("purchases", "write")?;

    let service = PurchaseService::new(state.db);
    let purchase = service.update_item(purchase_id, item_id, input).await?;
    Ok(Json(purchase))
}

/// Remove a purchase line
pub async fn remove_purchase_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((purchase_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<PurchaseDetails>> {
    current_user.require("purchases", "write")?;

    let service = PurchaseService::new(state.db);
    let purchase = service.remove_item(purchase_id, item_id).await?;
    Ok(Json(purchase))
}

/// Record the quantity received for a line
pub async fn receive_purchase_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((purchase_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ReceiveItemInput>,
) -> AppResult<Json<PurchaseDetails>> {
    current_user.require("purchases", "write")?;

    let service = PurchaseService::new(state.db);
    let purchase = service.receive_item(purchase_id, item_id, input).await?;
    Ok(Json(purchase))
}

/// Receive a fully delivered purchase into stock
pub async fn submit_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<Json<PurchaseDetails>> {
    current_user.require("purchases", "approve")?;

    let service = PurchaseService::new(state.db);
    let purchase = service.submit_purchase(purchase_id).await?;
    Ok(Json(purchase))
}
