//! Retail Inventory platform - backend library
//!
//! Multi-shop inventory transfers and weighted-average cost valuation served
//! over HTTP. The binary in `main.rs` wires this library to PostgreSQL; the
//! test-suite drives it through the in-memory ledger.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod routes;
pub mod services;

pub use config::Config;

use cache::CacheLayer;
use ledger::{LedgerStore, RetryPolicy};
use services::{PurchaseService, ShopService, TransferService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub cache: Arc<CacheLayer>,
    pub config: Arc<Config>,
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(ledger: Arc<dyn LedgerStore>, config: Config) -> Self {
        Self {
            cache: Arc::new(CacheLayer::new(&config.cache)),
            retry: RetryPolicy::from(&config.retry),
            config: Arc::new(config),
            ledger,
        }
    }

    pub fn transfer_service(&self) -> TransferService {
        TransferService::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.cache),
            self.config.ledger.transaction_timeout(),
        )
    }

    pub fn purchase_service(&self) -> PurchaseService {
        PurchaseService::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.cache),
            self.config.ledger.transaction_timeout(),
        )
    }

    pub fn shop_service(&self) -> ShopService {
        ShopService::new(Arc::clone(&self.ledger), Arc::clone(&self.cache))
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Retail Inventory Platform API v1.0"
}
