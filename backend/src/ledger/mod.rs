//! Ledger Store: transactional access to shops, products, inventory,
//! transfers and purchase invoices
//!
//! All inventory mutation goes through a [`LedgerTx`] unit of work obtained
//! from [`LedgerStore::begin`], normally via [`with_transaction`]. Display
//! reads are served directly by the store and tolerate eventual consistency.

mod memory;
mod postgres;
mod retry;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use retry::RetryPolicy;

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use rust_decimal::Decimal;
use shared::{
    InventoryItem, InventoryTransfer, InvoiceId, InvoiceStatus, ProductId,
    PurchaseInvoice, PurchaseInvoiceItem, Shop, ShopId, ShopInventoryLine, SupplierId,
    TransferDetail, TransferFilter, TransferId, TransferItem, TransferItemInput, TransferStatus,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// One atomic unit of work against the ledger.
///
/// `lock_*` reads take a write lock on the row for the rest of the
/// transaction so concurrent writers serialize on it. Dropping the unit of
/// work without calling [`LedgerTx::commit`] discards every change.
#[async_trait]
pub trait LedgerTx: Send {
    async fn list_shops(&mut self) -> AppResult<Vec<Shop>>;

    async fn get_shop(&mut self, shop_id: ShopId) -> AppResult<Option<Shop>>;

    /// The subset of `product_ids` that exist
    async fn existing_products(&mut self, product_ids: &[ProductId]) -> AppResult<Vec<ProductId>>;

    async fn set_product_cost(&mut self, product_id: ProductId, cost: Decimal) -> AppResult<()>;

    /// Lock product rows in ascending id order and return the ids that exist.
    ///
    /// Units of work take these before touching any inventory row of the
    /// products, so all writers of one product serialize on its row and no
    /// two writers can wait on each other's inventory rows.
    async fn lock_products(&mut self, product_ids: &[ProductId]) -> AppResult<Vec<ProductId>>;

    async fn lock_inventory_item(
        &mut self,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> AppResult<Option<InventoryItem>>;

    /// Lock the (shop, product) row, inserting an empty one first if absent
    async fn lock_or_insert_inventory_item(
        &mut self,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> AppResult<InventoryItem>;

    /// Insert or overwrite the (shop, product) row
    async fn save_inventory_item(&mut self, item: &InventoryItem) -> AppResult<()>;

    async fn inventory_for_product(&mut self, product_id: ProductId) -> AppResult<Vec<InventoryItem>>;

    async fn insert_transfer(
        &mut self,
        from_shop_id: ShopId,
        to_shop_id: ShopId,
        initiated_by: Option<Uuid>,
    ) -> AppResult<InventoryTransfer>;

    async fn lock_transfer(&mut self, transfer_id: TransferId) -> AppResult<Option<InventoryTransfer>>;

    async fn transfer_items(&mut self, transfer_id: TransferId) -> AppResult<Vec<TransferItem>>;

    async fn update_transfer_shops(
        &mut self,
        transfer_id: TransferId,
        from_shop_id: ShopId,
        to_shop_id: ShopId,
    ) -> AppResult<()>;

    /// Delete the transfer's items and insert `items` in their place
    async fn replace_transfer_items(
        &mut self,
        transfer_id: TransferId,
        items: &[TransferItemInput],
    ) -> AppResult<Vec<TransferItem>>;

    async fn set_transfer_status(
        &mut self,
        transfer_id: TransferId,
        status: TransferStatus,
    ) -> AppResult<InventoryTransfer>;

    /// Remove the transfer and its items
    async fn delete_transfer(&mut self, transfer_id: TransferId) -> AppResult<()>;

    async fn insert_invoice(
        &mut self,
        supplier_id: SupplierId,
        items: &[PurchaseInvoiceItem],
    ) -> AppResult<PurchaseInvoice>;

    async fn lock_invoice(&mut self, invoice_id: InvoiceId) -> AppResult<Option<PurchaseInvoice>>;

    /// Replace the supplier, items and allocations of an invoice
    async fn replace_invoice(
        &mut self,
        invoice_id: InvoiceId,
        supplier_id: SupplierId,
        items: &[PurchaseInvoiceItem],
    ) -> AppResult<PurchaseInvoice>;

    async fn set_invoice_status(
        &mut self,
        invoice_id: InvoiceId,
        status: InvoiceStatus,
    ) -> AppResult<PurchaseInvoice>;

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Storage backend for the ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    async fn transfer_detail(&self, transfer_id: TransferId) -> AppResult<Option<TransferDetail>>;

    async fn list_transfers(&self, filter: &TransferFilter) -> AppResult<Vec<InventoryTransfer>>;

    async fn invoice(&self, invoice_id: InvoiceId) -> AppResult<Option<PurchaseInvoice>>;

    async fn list_shops(&self) -> AppResult<Vec<Shop>>;

    /// Stock held by a shop, or `None` if the shop does not exist
    async fn shop_inventory(&self, shop_id: ShopId) -> AppResult<Option<Vec<ShopInventoryLine>>>;

    /// Connectivity check used by the health endpoint
    async fn ping(&self) -> AppResult<()>;
}

/// Run `work` inside one ledger transaction bounded by `limit`.
///
/// `limit` covers opening the unit of work and running `work`, including any
/// wait for row locks. If it elapses the unit is dropped, the store rolls it
/// back and `AppError::Timeout` is returned. The commit runs after the bound,
/// so an applied change is never reported as a timeout.
pub async fn with_transaction<T, F>(
    ledger: &dyn LedgerStore,
    limit: Duration,
    work: F,
) -> AppResult<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn LedgerTx) -> BoxFuture<'t, AppResult<T>> + Send,
{
    let unit = async {
        let mut tx = ledger.begin().await?;
        let outcome = work(tx.as_mut()).await;
        Ok::<_, AppError>((tx, outcome))
    };

    let (tx, outcome) = match tokio::time::timeout(limit, unit).await {
        Ok(opened) => opened?,
        Err(_) => {
            tracing::warn!("Ledger transaction timed out after {:?}", limit);
            return Err(AppError::Timeout(limit.as_secs()));
        }
    };

    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!("Rollback failed after {}: {}", err, rollback_err);
            }
            Err(err)
        }
    }
}
