//! HTTP handlers for write-off endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{WriteOff, WriteOffDetails};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::write_off::{
    CreateWriteOffInput, UpdateWriteOffItemInput, WriteOffItemInput, WriteOffListQuery,
};
use crate::services::{RejectInput, WriteOffService};
use crate::AppState;

/// Open a draft write-off
pub async fn create_write_off(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateWriteOffInput>,
) -> AppResult<(StatusCode, Json<WriteOffDetails>)> {
    current_user.require("write_offs", "write")?;

    let service = WriteOffService::new(state.db);
    let write_off = service.create_write_off(input).await?;
    Ok((StatusCode::CREATED, Json(write_off)))
}

/// List write-offs
pub async fn list_write_offs(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<WriteOffListQuery>,
) -> AppResult<Json<Vec<WriteOff>>> {
    current_user.require("write_offs", "read")?;

    let service = WriteOffService::new(state.db);
    let write_offs = service.list_write_offs(query).await?;
    Ok(Json(write_offs))
}

/// Get a write-off with its lines
pub async fn get_write_off(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(write_off_id): Path<Uuid>,
) -> AppResult<Json<WriteOffDetails>> {
    current_user.require("write_offs", "read")?;

    let service = WriteOffService::new(state.db);
    let write_off = service.get_write_off(write_off_id).await?;
    Ok(Json(write_off))
}

/// Delete a draft write-off
pub async fn delete_write_off(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(write_off_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.require("write_offs", "write")?;

    let service = WriteOffService::new(state.db);
    service.delete_write_off(write_off_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a line to a draft
pub async fn add_write_off_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(write_off_id): Path<Uuid>,
    Json(input): Json<WriteOffItemInput>,
) -> AppResult<Json<WriteOffDetails>> {
    current_user.require("write_offs", "write")?;

    let service = WriteOffService::new(state.db);
    let write_off = service.add_item(write_off_id, input).await?;
    Ok(Json(write_off))
}

/// Change the quantity of a draft line
pub async fn update_write_off_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((write_off_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateWriteOffItemInput>,
) -> AppResult<Json<WriteOffDetails>> {
    current_user.require("write_offs", "write")?;

    let service = WriteOffService::new(state.db);
    let write_off = service.update_item(write_off_id, item_id, input).await?;
    Ok(Json(write_off))
}

/// Remove a draft line
pub async fn remove_write_off_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((write_off_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<WriteOffDetails>> {
    current_user.require("write_offs", "write")?;

    let service = WriteOffService::new(state.db);
    let write_off = service.remove_item(write_off_id, item_id).await?;
    Ok(Json(write_off))
}

/// Submit a draft for approval
pub async fn submit_write_off(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(write_off_id): Path<Uuid>,
) -> AppResult<Json<WriteOffDetails>> {
    current_user.require("write_offs", "write")?;

    let service = WriteOffService::new(state.db);
    let write_off = service.submit_write_off(write_off_id).await?;
    Ok(Json(write_off))
}

/// Approve a write-off and remove its stock
pub async fn approve_write_off(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(write_off_id): Path<Uuid>,
) -> AppResult<Json<WriteOffDetails>> {
    current_user.require("write_offs", "approve")?;

    let service = WriteOffService::new(state.db);
    let write_off = service.approve_write_off(write_off_id).await?;
    Ok(Json(write_off))
}

/// Return a write-off to draft with a reason
pub async fn reject_write_off(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(write_off_id): Path<Uuid>,
    Json(input): Json<RejectInput>,
) -> AppResult<Json<WriteOffDetails>> {
    current_user.require("write_offs", "approve")?;

    let service = WriteOffService::new(state.db);
    let write_off = service.reject_write_off(write_off_id, input).await?;
    Ok(Json(write_off))
}
