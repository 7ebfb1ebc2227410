//! Read cache and request coalescing tests

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{dec, transfer_input, Fixture};
use rim_backend::cache::CacheLayer;
use rim_backend::config::CacheConfig;
use rim_backend::error::AppResult;
use rim_backend::ledger::{LedgerStore, LedgerTx, MemoryLedgerStore};
use rim_backend::services::TransferService;
use shared::{
    InventoryTransfer, InvoiceId, PurchaseInvoice, Shop, ShopId, ShopInventoryLine,
    TransferDetail, TransferFilter, TransferId, TransferStatus,
};

/// Delegates to the in-memory ledger, counting and slowing detail reads
struct CountingLedger {
    inner: MemoryLedgerStore,
    detail_reads: AtomicUsize,
}

#[async_trait]
impl LedgerStore for CountingLedger {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        self.inner.begin().await
    }

    async fn transfer_detail(&self, transfer_id: TransferId) -> AppResult<Option<TransferDetail>> {
        self.detail_reads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.inner.transfer_detail(transfer_id).await
    }

    async fn list_transfers(&self, filter: &TransferFilter) -> AppResult<Vec<InventoryTransfer>> {
        self.inner.list_transfers(filter).await
    }

    async fn invoice(&self, invoice_id: InvoiceId) -> AppResult<Option<PurchaseInvoice>> {
        self.inner.invoice(invoice_id).await
    }

    async fn list_shops(&self) -> AppResult<Vec<Shop>> {
        self.inner.list_shops().await
    }

    async fn shop_inventory(&self, shop_id: ShopId) -> AppResult<Option<Vec<ShopInventoryLine>>> {
        self.inner.shop_inventory(shop_id).await
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.ping().await
    }
}

async fn counting_service(fx: &Fixture) -> (Arc<CountingLedger>, TransferService) {
    let ledger = Arc::new(CountingLedger {
        inner: fx.store.clone(),
        detail_reads: AtomicUsize::new(0),
    });
    let cache = Arc::new(CacheLayer::new(&CacheConfig::default()));
    let service = TransferService::new(ledger.clone(), cache, Duration::from_secs(30));
    (ledger, service)
}

#[tokio::test]
async fn test_concurrent_detail_reads_share_one_fetch() {
    let fx = Fixture::new().await;
    fx.store.set_stock(fx.shop_a.id, fx.product.id, 10, dec("100")).await;
    let (ledger, service) = counting_service(&fx).await;

    let transfer = service
        .create(transfer_input(&fx.shop_a, &fx.shop_b, &[(&fx.product, 2)]), None)
        .await
        .unwrap();

    let (a, b, c) = tokio::join!(
        service.detail(transfer.id),
        service.detail(transfer.id),
        service.detail(transfer.id),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(ledger.detail_reads.load(Ordering::SeqCst), 1);

    // Served from cache afterwards
    service.detail(transfer.id).await.unwrap();
    assert_eq!(ledger.detail_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mutation_invalidates_detail() {
    let fx = Fixture::new().await;
    fx.store.set_stock(fx.shop_a.id, fx.product.id, 10, dec("100")).await;
    let (ledger, service) = counting_service(&fx).await;

    let transfer = service
        .create(transfer_input(&fx.shop_a, &fx.shop_b, &[(&fx.product, 2)]), None)
        .await
        .unwrap();
    assert_eq!(
        service.detail(transfer.id).await.unwrap().status,
        TransferStatus::Pending
    );

    service.complete(transfer.id).await.unwrap();

    let detail = service.detail(transfer.id).await.unwrap();
    assert_eq!(detail.status, TransferStatus::Completed);
    assert!(detail.completed_at.is_some());
    assert_eq!(ledger.detail_reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_transfer_flushes_both_shop_listings() {
    let fx = Fixture::new().await;
    fx.store.set_stock(fx.shop_a.id, fx.product.id, 10, dec("100")).await;
    let shops = fx.shops();
    let transfers = fx.transfers();

    let transfer = transfers
        .create(transfer_input(&fx.shop_a, &fx.shop_b, &[(&fx.product, 4)]), None)
        .await
        .unwrap();

    let source = shops.inventory(fx.shop_a.id).await.unwrap();
    assert_eq!(source[0].reserved_quantity, 4);
    assert!(shops.inventory(fx.shop_b.id).await.unwrap().is_empty());
    assert!(fx.cache.is_shop_inventory_cached(fx.shop_a.id));
    assert!(fx.cache.is_shop_inventory_cached(fx.shop_b.id));

    transfers.complete(transfer.id).await.unwrap();
    assert!(!fx.cache.is_shop_inventory_cached(fx.shop_a.id));
    assert!(!fx.cache.is_shop_inventory_cached(fx.shop_b.id));

    let source = shops.inventory(fx.shop_a.id).await.unwrap();
    let destination = shops.inventory(fx.shop_b.id).await.unwrap();
    assert_eq!((source[0].quantity, source[0].reserved_quantity), (6, 0));
    assert_eq!(destination[0].quantity, 4);
    assert_eq!(destination[0].shop_specific_cost, dec("100"));
    assert_eq!(destination[0].total_value, dec("400"));
}

#[tokio::test]
async fn test_missing_shop_is_not_cached() {
    let fx = Fixture::new().await;
    assert!(fx.shops().inventory(999).await.is_err());
    assert!(!fx.cache.is_shop_inventory_cached(999));
}

#[tokio::test]
async fn test_stale_cache_never_blocks_a_write() {
    let fx = Fixture::new().await;
    fx.store.set_stock(fx.shop_a.id, fx.product.id, 10, dec("100")).await;
    let transfers = fx.transfers();

    let transfer = transfers
        .create(transfer_input(&fx.shop_a, &fx.shop_b, &[(&fx.product, 10)]), None)
        .await
        .unwrap();
    // Cache the pending detail, then drain the source behind the cache's back
    transfers.detail(transfer.id).await.unwrap();
    fx.store.set_stock(fx.shop_a.id, fx.product.id, 3, dec("100")).await;

    // Completion re-reads stock in its own transaction
    let err = transfers.complete(transfer.id).await.unwrap_err();
    assert!(matches!(
        err,
        rim_backend::error::AppError::InsufficientInventory {
            available: 3,
            requested: 10,
            ..
        }
    ));
}
