//! HTTP handlers for inventory transfer endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use shared::{
    ApiMessage, IdPayload, InventoryTransfer, TransferAction, TransferDetail, TransferFilter,
    TransferInput,
};

use super::parse_id;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

/// List transfers, newest first
pub async fn list_transfers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    filter: Result<Query<TransferFilter>, QueryRejection>,
) -> AppResult<Json<Vec<InventoryTransfer>>> {
    user.require("inventory_transfer", "view")?;
    let Query(filter) = filter?;

    let transfers = state.transfer_service().list(&filter).await?;
    Ok(Json(transfers))
}

/// Create a pending transfer
pub async fn create_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<TransferInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiMessage<InventoryTransfer>>)> {
    user.require("inventory_transfer", "edit")?;
    let Json(input) = body?;

    let transfer = state
        .transfer_service()
        .create(input, Some(user.user_id))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiMessage::with_data("Transfer created", transfer)),
    ))
}

/// Get a transfer with shop names and item details
pub async fn get_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
) -> AppResult<Json<TransferDetail>> {
    let transfer_id = parse_id(&raw_id, "transfer")?;
    user.require("inventory_transfer", "view")?;

    let detail = state.transfer_service().detail(transfer_id).await?;
    Ok(Json(detail))
}

/// Replace the shops and items of a pending transfer
pub async fn update_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
    body: Result<Json<TransferInput>, JsonRejection>,
) -> AppResult<Json<ApiMessage<IdPayload>>> {
    let transfer_id = parse_id(&raw_id, "transfer")?;
    user.require("inventory_transfer", "edit")?;
    let Json(input) = body?;

    let transfer = state.transfer_service().update(transfer_id, input).await?;
    Ok(Json(ApiMessage::with_data(
        "Transfer updated",
        IdPayload { id: transfer.id },
    )))
}

/// Complete or cancel a transfer; retried on timeout only
pub async fn patch_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
    body: Result<Json<TransferAction>, JsonRejection>,
) -> AppResult<Json<ApiMessage<InventoryTransfer>>> {
    let transfer_id = parse_id(&raw_id, "transfer")?;
    user.require("inventory_transfer", "edit")?;
    let Json(action) = body?;

    let service = state.transfer_service();
    let transfer = state
        .retry
        .run(|| service.apply(transfer_id, action))
        .await?;

    let message = match action {
        TransferAction::Complete => "Transfer completed",
        TransferAction::Cancel => "Transfer cancelled",
    };
    Ok(Json(ApiMessage::with_data(message, transfer)))
}

/// Delete a pending transfer
pub async fn delete_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
) -> AppResult<Json<ApiMessage<()>>> {
    let transfer_id = parse_id(&raw_id, "transfer")?;
    user.require("inventory_transfer", "delete")?;

    state.transfer_service().delete(transfer_id).await?;
    Ok(Json(ApiMessage::message("Transfer deleted")))
}
