//! Shop listing and per-shop stock views

use std::sync::Arc;

use shared::{Shop, ShopId, ShopInventoryLine};

use crate::cache::CacheLayer;
use crate::error::{AppError, AppResult};
use crate::ledger::LedgerStore;

#[derive(Clone)]
pub struct ShopService {
    ledger: Arc<dyn LedgerStore>,
    cache: Arc<CacheLayer>,
}

impl ShopService {
    pub fn new(ledger: Arc<dyn LedgerStore>, cache: Arc<CacheLayer>) -> Self {
        Self { ledger, cache }
    }

    pub async fn list(&self) -> AppResult<Vec<Shop>> {
        self.ledger.list_shops().await
    }

    /// Stock and cost of every product held by a shop, served from cache
    pub async fn inventory(&self, shop_id: ShopId) -> AppResult<Vec<ShopInventoryLine>> {
        self.cache
            .shop_inventory(Arc::clone(&self.ledger), shop_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Shop {}", shop_id)))
    }
}
