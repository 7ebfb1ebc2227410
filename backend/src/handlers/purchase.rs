//! HTTP handlers for purchase invoices

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use shared::{ApiMessage, PurchaseInvoice, PurchaseInvoiceInput};

use super::parse_id;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

/// Create a draft invoice with its shop distribution
pub async fn create_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<PurchaseInvoiceInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiMessage<PurchaseInvoice>>)> {
    user.require("purchase_invoice", "edit")?;
    let Json(input) = body?;

    let invoice = state.purchase_service().create(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiMessage::with_data("Purchase invoice created", invoice)),
    ))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
) -> AppResult<Json<PurchaseInvoice>> {
    let invoice_id = parse_id(&raw_id, "purchase invoice")?;
    user.require("purchase_invoice", "view")?;

    let invoice = state.purchase_service().get(invoice_id).await?;
    Ok(Json(invoice))
}

/// Replace the items and distribution of a draft invoice
pub async fn update_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
    body: Result<Json<PurchaseInvoiceInput>, JsonRejection>,
) -> AppResult<Json<ApiMessage<PurchaseInvoice>>> {
    let invoice_id = parse_id(&raw_id, "purchase invoice")?;
    user.require("purchase_invoice", "edit")?;
    let Json(input) = body?;

    let invoice = state.purchase_service().update(invoice_id, input).await?;
    Ok(Json(ApiMessage::with_data("Purchase invoice updated", invoice)))
}

/// Post a draft invoice into inventory; retried on timeout only
pub async fn receive_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
) -> AppResult<Json<ApiMessage<PurchaseInvoice>>> {
    let invoice_id = parse_id(&raw_id, "purchase invoice")?;
    user.require("purchase_invoice", "edit")?;

    let service = state.purchase_service();
    let invoice = state.retry.run(|| service.receive(invoice_id)).await?;
    Ok(Json(ApiMessage::with_data("Purchase invoice received", invoice)))
}
