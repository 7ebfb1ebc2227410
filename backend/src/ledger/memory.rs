//! In-process ledger store
//!
//! Serializable by construction: a unit of work holds the single writer lock
//! for its whole lifetime, mutates a private working copy and publishes it
//! atomically on commit. Used by the test-suite and for local runs without
//! PostgreSQL.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    global_weighted_average_cost, InventoryItem, InventoryTransfer, InvoiceId, InvoiceStatus,
    Product, ProductId, PurchaseInvoice, PurchaseInvoiceItem, Shop, ShopId, ShopInventoryLine,
    SupplierId, TransferDetail, TransferFilter, TransferId, TransferItem, TransferItemDetail,
    TransferItemInput, TransferStatus,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    shops: BTreeMap<ShopId, Shop>,
    products: BTreeMap<ProductId, Product>,
    inventory: BTreeMap<(ShopId, ProductId), InventoryItem>,
    transfers: BTreeMap<TransferId, InventoryTransfer>,
    transfer_items: BTreeMap<i64, TransferItem>,
    invoices: BTreeMap<InvoiceId, PurchaseInvoice>,
    next_id: i64,
}

impl LedgerState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn items_of(&self, transfer_id: TransferId) -> Vec<TransferItem> {
        self.transfer_items
            .values()
            .filter(|i| i.transfer_id == transfer_id)
            .cloned()
            .collect()
    }

    fn transfer_mut(&mut self, transfer_id: TransferId) -> AppResult<&mut InventoryTransfer> {
        self.transfers
            .get_mut(&transfer_id)
            .ok_or_else(|| AppError::NotFound(format!("Transfer {}", transfer_id)))
    }

    fn invoice_mut(&mut self, invoice_id: InvoiceId) -> AppResult<&mut PurchaseInvoice> {
        self.invoices
            .get_mut(&invoice_id)
            .ok_or_else(|| AppError::NotFound(format!("Purchase invoice {}", invoice_id)))
    }
}

/// Ledger store kept in process memory
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_shop(&self, name: &str, is_default: bool) -> Shop {
        let mut state = self.state.lock().await;
        let shop = Shop {
            id: state.next_id(),
            name: name.to_string(),
            is_default,
            created_at: Utc::now(),
        };
        state.shops.insert(shop.id, shop.clone());
        shop
    }

    pub async fn add_product(&self, name: &str, sku: &str, price: Decimal) -> Product {
        let mut state = self.state.lock().await;
        let product = Product {
            id: state.next_id(),
            name: name.to_string(),
            sku: sku.to_string(),
            price,
            weighted_average_cost: Decimal::ZERO,
        };
        state.products.insert(product.id, product.clone());
        product
    }

    /// Set opening stock for a shop and refresh the product's global cost
    pub async fn set_stock(
        &self,
        shop_id: ShopId,
        product_id: ProductId,
        quantity: i32,
        shop_specific_cost: Decimal,
    ) {
        let mut state = self.state.lock().await;
        let mut item = state
            .inventory
            .get(&(shop_id, product_id))
            .cloned()
            .unwrap_or_else(|| InventoryItem::empty(shop_id, product_id));
        item.quantity = quantity;
        item.shop_specific_cost = shop_specific_cost;
        state.inventory.insert((shop_id, product_id), item);

        let cost = global_weighted_average_cost(
            state
                .inventory
                .values()
                .filter(|i| i.product_id == product_id)
                .map(|i| (i.quantity as i64, i.shop_specific_cost)),
        )
        .unwrap_or(Decimal::ZERO);
        if let Some(product) = state.products.get_mut(&product_id) {
            product.weighted_average_cost = cost;
        }
    }

    pub async fn inventory_item(
        &self,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> Option<InventoryItem> {
        self.state
            .lock()
            .await
            .inventory
            .get(&(shop_id, product_id))
            .cloned()
    }

    pub async fn product(&self, product_id: ProductId) -> Option<Product> {
        self.state.lock().await.products.get(&product_id).cloned()
    }

    pub async fn transfer(&self, transfer_id: TransferId) -> Option<InventoryTransfer> {
        self.state.lock().await.transfers.get(&transfer_id).cloned()
    }

    pub async fn transfer_item_count(&self, transfer_id: TransferId) -> usize {
        self.state.lock().await.items_of(transfer_id).len()
    }

    /// Total units of a product across every shop
    pub async fn total_quantity(&self, product_id: ProductId) -> i64 {
        self.state
            .lock()
            .await
            .inventory
            .values()
            .filter(|i| i.product_id == product_id)
            .map(|i| i.quantity as i64)
            .sum()
    }
}

/// A unit of work holding the writer lock
struct MemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn list_shops(&mut self) -> AppResult<Vec<Shop>> {
        Ok(self.working.shops.values().cloned().collect())
    }

    async fn get_shop(&mut self, shop_id: ShopId) -> AppResult<Option<Shop>> {
        Ok(self.working.shops.get(&shop_id).cloned())
    }

    async fn existing_products(&mut self, product_ids: &[ProductId]) -> AppResult<Vec<ProductId>> {
        Ok(product_ids
            .iter()
            .copied()
            .filter(|id| self.working.products.contains_key(id))
            .collect())
    }

    async fn set_product_cost(&mut self, product_id: ProductId, cost: Decimal) -> AppResult<()> {
        let product = self
            .working
            .products
            .get_mut(&product_id)
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;
        product.weighted_average_cost = cost;
        Ok(())
    }

    async fn lock_products(&mut self, product_ids: &[ProductId]) -> AppResult<Vec<ProductId>> {
        let mut found: Vec<ProductId> = product_ids
            .iter()
            .copied()
            .filter(|id| self.working.products.contains_key(id))
            .collect();
        found.sort_unstable();
        found.dedup();
        Ok(found)
    }

    async fn lock_or_insert_inventory_item(
        &mut self,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> AppResult<InventoryItem> {
        Ok(self
            .working
            .inventory
            .entry((shop_id, product_id))
            .or_insert_with(|| InventoryItem::empty(shop_id, product_id))
            .clone())
    }

    async fn lock_inventory_item(
        &mut self,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> AppResult<Option<InventoryItem>> {
        Ok(self.working.inventory.get(&(shop_id, product_id)).cloned())
    }

    async fn save_inventory_item(&mut self, item: &InventoryItem) -> AppResult<()> {
        if item.quantity < 0 || item.reserved_quantity < 0 {
            return Err(AppError::Internal(format!(
                "Refusing to store negative stock for product {} in shop {}",
                item.product_id, item.shop_id
            )));
        }
        let mut item = item.clone();
        item.updated_at = Utc::now();
        self.working
            .inventory
            .insert((item.shop_id, item.product_id), item);
        Ok(())
    }

    async fn inventory_for_product(&mut self, product_id: ProductId) -> AppResult<Vec<InventoryItem>> {
        Ok(self
            .working
            .inventory
            .values()
            .filter(|i| i.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn insert_transfer(
        &mut self,
        from_shop_id: ShopId,
        to_shop_id: ShopId,
        initiated_by: Option<Uuid>,
    ) -> AppResult<InventoryTransfer> {
        let now = Utc::now();
        let transfer = InventoryTransfer {
            id: self.working.next_id(),
            from_shop_id,
            to_shop_id,
            status: TransferStatus::Pending,
            initiated_by,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.working.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    async fn lock_transfer(&mut self, transfer_id: TransferId) -> AppResult<Option<InventoryTransfer>> {
        Ok(self.working.transfers.get(&transfer_id).cloned())
    }

    async fn transfer_items(&mut self, transfer_id: TransferId) -> AppResult<Vec<TransferItem>> {
        Ok(self.working.items_of(transfer_id))
    }

    async fn update_transfer_shops(
        &mut self,
        transfer_id: TransferId,
        from_shop_id: ShopId,
        to_shop_id: ShopId,
    ) -> AppResult<()> {
        let transfer = self.working.transfer_mut(transfer_id)?;
        transfer.from_shop_id = from_shop_id;
        transfer.to_shop_id = to_shop_id;
        transfer.updated_at = Utc::now();
        Ok(())
    }

    async fn replace_transfer_items(
        &mut self,
        transfer_id: TransferId,
        items: &[TransferItemInput],
    ) -> AppResult<Vec<TransferItem>> {
        self.working
            .transfer_items
            .retain(|_, item| item.transfer_id != transfer_id);

        let mut created = Vec::with_capacity(items.len());
        for input in items {
            let item = TransferItem {
                id: self.working.next_id(),
                transfer_id,
                product_id: input.product_id,
                quantity: input.quantity,
            };
            self.working.transfer_items.insert(item.id, item.clone());
            created.push(item);
        }
        Ok(created)
    }

    async fn set_transfer_status(
        &mut self,
        transfer_id: TransferId,
        status: TransferStatus,
    ) -> AppResult<InventoryTransfer> {
        let transfer = self.working.transfer_mut(transfer_id)?;
        let now = Utc::now();
        transfer.status = status;
        transfer.updated_at = now;
        if status == TransferStatus::Completed {
            transfer.completed_at = Some(now);
        }
        Ok(transfer.clone())
    }

    async fn delete_transfer(&mut self, transfer_id: TransferId) -> AppResult<()> {
        self.working
            .transfer_items
            .retain(|_, item| item.transfer_id != transfer_id);
        self.working
            .transfers
            .remove(&transfer_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Transfer {}", transfer_id)))
    }

    async fn insert_invoice(
        &mut self,
        supplier_id: SupplierId,
        items: &[PurchaseInvoiceItem],
    ) -> AppResult<PurchaseInvoice> {
        let invoice = PurchaseInvoice {
            id: self.working.next_id(),
            supplier_id,
            status: InvoiceStatus::Draft,
            items: items.to_vec(),
            created_at: Utc::now(),
            received_at: None,
        };
        self.working.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn lock_invoice(&mut self, invoice_id: InvoiceId) -> AppResult<Option<PurchaseInvoice>> {
        Ok(self.working.invoices.get(&invoice_id).cloned())
    }

    async fn replace_invoice(
        &mut self,
        invoice_id: InvoiceId,
        supplier_id: SupplierId,
        items: &[PurchaseInvoiceItem],
    ) -> AppResult<PurchaseInvoice> {
        let invoice = self.working.invoice_mut(invoice_id)?;
        invoice.supplier_id = supplier_id;
        invoice.items = items.to_vec();
        Ok(invoice.clone())
    }

    async fn set_invoice_status(
        &mut self,
        invoice_id: InvoiceId,
        status: InvoiceStatus,
    ) -> AppResult<PurchaseInvoice> {
        let invoice = self.working.invoice_mut(invoice_id)?;
        invoice.status = status;
        if status == InvoiceStatus::Received {
            invoice.received_at = Some(Utc::now());
        }
        Ok(invoice.clone())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn transfer_detail(&self, transfer_id: TransferId) -> AppResult<Option<TransferDetail>> {
        let state = self.state.lock().await;
        let Some(transfer) = state.transfers.get(&transfer_id) else {
            return Ok(None);
        };

        let shop_name = |id: ShopId| {
            state
                .shops
                .get(&id)
                .map(|s| s.name.clone())
                .unwrap_or_default()
        };

        let items = state
            .items_of(transfer_id)
            .into_iter()
            .map(|item| {
                let product = state.products.get(&item.product_id);
                TransferItemDetail {
                    id: item.id,
                    product_id: item.product_id,
                    product_name: product.map(|p| p.name.clone()).unwrap_or_default(),
                    sku: product.map(|p| p.sku.clone()).unwrap_or_default(),
                    quantity: item.quantity,
                    price: product.map(|p| p.price).unwrap_or_default(),
                }
            })
            .collect();

        Ok(Some(TransferDetail {
            id: transfer.id,
            status: transfer.status,
            created_at: transfer.created_at,
            completed_at: transfer.completed_at,
            source_shop_id: transfer.from_shop_id,
            destination_shop_id: transfer.to_shop_id,
            source_shop_name: shop_name(transfer.from_shop_id),
            destination_shop_name: shop_name(transfer.to_shop_id),
            initiated_by: transfer.initiated_by,
            items,
        }))
    }

    async fn list_transfers(&self, filter: &TransferFilter) -> AppResult<Vec<InventoryTransfer>> {
        let state = self.state.lock().await;
        let mut transfers: Vec<_> = state
            .transfers
            .values()
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| {
                filter
                    .shop_id
                    .map_or(true, |s| t.from_shop_id == s || t.to_shop_id == s)
            })
            .cloned()
            .collect();
        transfers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(transfers)
    }

    async fn invoice(&self, invoice_id: InvoiceId) -> AppResult<Option<PurchaseInvoice>> {
        Ok(self.state.lock().await.invoices.get(&invoice_id).cloned())
    }

    async fn list_shops(&self) -> AppResult<Vec<Shop>> {
        Ok(self.state.lock().await.shops.values().cloned().collect())
    }

    async fn shop_inventory(&self, shop_id: ShopId) -> AppResult<Option<Vec<ShopInventoryLine>>> {
        let state = self.state.lock().await;
        if !state.shops.contains_key(&shop_id) {
            return Ok(None);
        }

        let lines = state
            .inventory
            .values()
            .filter(|i| i.shop_id == shop_id)
            .filter_map(|item| {
                state.products.get(&item.product_id).map(|product| ShopInventoryLine {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    sku: product.sku.clone(),
                    quantity: item.quantity,
                    reserved_quantity: item.reserved_quantity,
                    shop_specific_cost: item.shop_specific_cost,
                    total_value: item.total_value(),
                })
            })
            .collect();
        Ok(Some(lines))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
