//! Shared fixtures for the backend integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rim_backend::cache::CacheLayer;
use rim_backend::config::{
    CacheConfig, Config, DatabaseConfig, JwtConfig, LedgerConfig, RetryConfig, ServerConfig,
};
use rim_backend::ledger::{LedgerStore, MemoryLedgerStore};
use rim_backend::services::{PurchaseService, ShopService, TransferService};
use rust_decimal::Decimal;
use shared::{Product, Shop, TransferInput, TransferItemInput};

pub const JWT_SECRET: &str = "test-secret";

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn transfer_input(source: &Shop, destination: &Shop, items: &[(&Product, i32)]) -> TransferInput {
    TransferInput {
        source_shop_id: source.id,
        destination_shop_id: destination.id,
        items: items
            .iter()
            .map(|(product, quantity)| TransferItemInput {
                product_id: product.id,
                quantity: *quantity,
            })
            .collect(),
    }
}

pub fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 0,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
        },
        ledger: LedgerConfig::default(),
        cache: CacheConfig::default(),
        retry: RetryConfig {
            max_attempts: 1,
            base_delay_ms: 0,
        },
    }
}

/// Two shops (A is the default) and one product
pub struct Fixture {
    pub store: MemoryLedgerStore,
    pub ledger: Arc<dyn LedgerStore>,
    pub cache: Arc<CacheLayer>,
    pub shop_a: Shop,
    pub shop_b: Shop,
    pub product: Product,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = MemoryLedgerStore::new();
        let shop_a = store.add_shop("Main Street", true).await;
        let shop_b = store.add_shop("Harbour", false).await;
        let product = store.add_product("Espresso Beans 1kg", "ESP-1KG", dec("450")).await;

        Self {
            ledger: Arc::new(store.clone()),
            cache: Arc::new(CacheLayer::new(&CacheConfig::default())),
            store,
            shop_a,
            shop_b,
            product,
        }
    }

    pub fn transfers(&self) -> TransferService {
        self.transfers_with_timeout(Duration::from_secs(30))
    }

    pub fn transfers_with_timeout(&self, timeout: Duration) -> TransferService {
        TransferService::new(Arc::clone(&self.ledger), Arc::clone(&self.cache), timeout)
    }

    pub fn purchases(&self) -> PurchaseService {
        PurchaseService::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.cache),
            Duration::from_secs(30),
        )
    }

    pub fn shops(&self) -> ShopService {
        ShopService::new(Arc::clone(&self.ledger), Arc::clone(&self.cache))
    }

    /// (quantity, reserved, shop cost) of a product in a shop; zeros if absent
    pub async fn stock(&self, shop: &Shop, product: &Product) -> (i32, i32, Decimal) {
        self.store
            .inventory_item(shop.id, product.id)
            .await
            .map(|i| (i.quantity, i.reserved_quantity, i.shop_specific_cost))
            .unwrap_or((0, 0, Decimal::ZERO))
    }

    pub async fn global_cost(&self, product: &Product) -> Decimal {
        self.store
            .product(product.id)
            .await
            .map(|p| p.weighted_average_cost)
            .unwrap_or_default()
    }
}
