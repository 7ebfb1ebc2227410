//! HTTP handlers for shops and per-shop stock

use axum::{
    extract::{Path, State},
    Json,
};
use shared::{Shop, ShopInventoryLine};

use super::parse_id;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

/// List all shops
pub async fn list_shops(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Shop>>> {
    user.require("inventory", "view")?;

    let shops = state.shop_service().list().await?;
    Ok(Json(shops))
}

/// Stock and cost of every product in a shop
pub async fn get_shop_inventory(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Vec<ShopInventoryLine>>> {
    let shop_id = parse_id(&raw_id, "shop")?;
    user.require("inventory", "view")?;

    let lines = state.shop_service().inventory(shop_id).await?;
    Ok(Json(lines))
}
