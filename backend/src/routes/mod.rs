//! Route definitions for the Retail Inventory platform

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - transfers
        .nest("/transfers", transfer_routes(state.clone()))
        // Protected routes - purchase invoices
        .nest("/purchase-invoices", purchase_routes(state.clone()))
        // Protected routes - shops and per-shop stock
        .nest("/shops", shop_routes(state))
}

/// Inventory transfer routes (protected)
fn transfer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_transfers).post(handlers::create_transfer),
        )
        .route(
            "/:id",
            get(handlers::get_transfer)
                .put(handlers::update_transfer)
                .patch(handlers::patch_transfer)
                .delete(handlers::delete_transfer),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Purchase invoice routes (protected)
fn purchase_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_invoice))
        .route(
            "/:id",
            get(handlers::get_invoice).put(handlers::update_invoice),
        )
        .route("/:id/receive", post(handlers::receive_invoice))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Shop routes (protected)
fn shop_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_shops))
        .route("/:id/inventory", get(handlers::get_shop_inventory))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
