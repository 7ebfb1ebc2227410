//! Transfer Engine
//!
//! Owns the transfer state machine (pending -> completed | cancelled) and the
//! stock movements tied to it. A pending transfer reserves its quantities in
//! the source shop; completion moves the stock and recalculates costs;
//! cancellation and deletion only release the reservation.
//!
//! Every mutation runs as one ledger transaction: all of it commits or none
//! of it does. Each one locks the transfer row, then the rows of every product
//! it touches in ascending id order, before reading or writing stock. The read
//! cache is flushed after commit and never consulted while mutating.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use shared::{
    validate_transfer_input, InventoryItem, InventoryTransfer, ProductId, ShopId, TransferAction,
    TransferDetail, TransferFilter, TransferId, TransferInput, TransferItem, TransferItemInput,
    TransferStatus,
};
use uuid::Uuid;

use super::valuation;
use crate::cache::CacheLayer;
use crate::error::{AppError, AppResult};
use crate::ledger::{with_transaction, LedgerStore, LedgerTx};

/// Transfer service driving transfers through the ledger
#[derive(Clone)]
pub struct TransferService {
    ledger: Arc<dyn LedgerStore>,
    cache: Arc<CacheLayer>,
    timeout: Duration,
}

impl TransferService {
    pub fn new(ledger: Arc<dyn LedgerStore>, cache: Arc<CacheLayer>, timeout: Duration) -> Self {
        Self {
            ledger,
            cache,
            timeout,
        }
    }

    /// Create a pending transfer and reserve its quantities in the source shop
    pub async fn create(
        &self,
        input: TransferInput,
        initiated_by: Option<Uuid>,
    ) -> AppResult<InventoryTransfer> {
        validate_transfer_input(&input)?;

        let transfer = with_transaction(self.ledger.as_ref(), self.timeout, move |tx| {
            create_in(tx, input, initiated_by).boxed()
        })
        .await?;

        self.cache
            .invalidate_transfer(transfer.id, &[transfer.from_shop_id, transfer.to_shop_id]);
        tracing::info!(
            "Created transfer {} from shop {} to shop {}",
            transfer.id,
            transfer.from_shop_id,
            transfer.to_shop_id
        );
        Ok(transfer)
    }

    /// Replace the shop pair and items of a pending transfer
    pub async fn update(
        &self,
        transfer_id: TransferId,
        input: TransferInput,
    ) -> AppResult<InventoryTransfer> {
        validate_transfer_input(&input)?;

        let (previous, transfer) = with_transaction(self.ledger.as_ref(), self.timeout, move |tx| {
            update_in(tx, transfer_id, input).boxed()
        })
        .await?;

        self.cache.invalidate_transfer(
            transfer_id,
            &[
                previous.from_shop_id,
                previous.to_shop_id,
                transfer.from_shop_id,
                transfer.to_shop_id,
            ],
        );
        tracing::info!("Updated transfer {}", transfer_id);
        Ok(transfer)
    }

    pub async fn apply(
        &self,
        transfer_id: TransferId,
        action: TransferAction,
    ) -> AppResult<InventoryTransfer> {
        match action {
            TransferAction::Complete => self.complete(transfer_id).await,
            TransferAction::Cancel => self.cancel(transfer_id).await,
        }
    }

    /// Move the reserved stock to the destination and recalculate costs
    pub async fn complete(&self, transfer_id: TransferId) -> AppResult<InventoryTransfer> {
        let transfer = with_transaction(self.ledger.as_ref(), self.timeout, move |tx| {
            complete_in(tx, transfer_id).boxed()
        })
        .await?;

        self.cache
            .invalidate_transfer(transfer_id, &[transfer.from_shop_id, transfer.to_shop_id]);
        tracing::info!("Completed transfer {}", transfer_id);
        Ok(transfer)
    }

    /// Release the reservation; no cost changes
    pub async fn cancel(&self, transfer_id: TransferId) -> AppResult<InventoryTransfer> {
        let transfer = with_transaction(self.ledger.as_ref(), self.timeout, move |tx| {
            cancel_in(tx, transfer_id).boxed()
        })
        .await?;

        self.cache
            .invalidate_transfer(transfer_id, &[transfer.from_shop_id, transfer.to_shop_id]);
        tracing::info!("Cancelled transfer {}", transfer_id);
        Ok(transfer)
    }

    /// Release the reservation of a pending transfer and remove it
    pub async fn delete(&self, transfer_id: TransferId) -> AppResult<()> {
        let transfer = with_transaction(self.ledger.as_ref(), self.timeout, move |tx| {
            delete_in(tx, transfer_id).boxed()
        })
        .await?;

        self.cache
            .invalidate_transfer(transfer_id, &[transfer.from_shop_id, transfer.to_shop_id]);
        tracing::info!("Deleted transfer {}", transfer_id);
        Ok(())
    }

    pub async fn detail(&self, transfer_id: TransferId) -> AppResult<TransferDetail> {
        self.cache
            .transfer_detail(Arc::clone(&self.ledger), transfer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transfer {}", transfer_id)))
    }

    pub async fn list(&self, filter: &TransferFilter) -> AppResult<Vec<InventoryTransfer>> {
        self.ledger.list_transfers(filter).await
    }
}

async fn create_in(
    tx: &mut dyn LedgerTx,
    input: TransferInput,
    initiated_by: Option<Uuid>,
) -> AppResult<InventoryTransfer> {
    require_shop(tx, input.source_shop_id).await?;
    require_shop(tx, input.destination_shop_id).await?;
    valuation::lock_products(tx, input.items.iter().map(|i| i.product_id)).await?;

    let transfer = tx
        .insert_transfer(input.source_shop_id, input.destination_shop_id, initiated_by)
        .await?;
    reserve(tx, input.source_shop_id, &input.items).await?;
    tx.replace_transfer_items(transfer.id, &input.items).await?;
    Ok(transfer)
}

/// Returns the transfer before and after the update
async fn update_in(
    tx: &mut dyn LedgerTx,
    transfer_id: TransferId,
    input: TransferInput,
) -> AppResult<(InventoryTransfer, InventoryTransfer)> {
    let previous = lock_transfer(tx, transfer_id).await?;
    require_pending(&previous, "updated")?;

    require_shop(tx, input.source_shop_id).await?;
    require_shop(tx, input.destination_shop_id).await?;

    let old_items = tx.transfer_items(transfer_id).await?;
    valuation::lock_products(
        tx,
        old_items
            .iter()
            .map(|i| i.product_id)
            .chain(input.items.iter().map(|i| i.product_id)),
    )
    .await?;

    // Release first so the same stock can be re-reserved by the new items
    release(tx, previous.from_shop_id, &old_items).await?;
    reserve(tx, input.source_shop_id, &input.items).await?;

    tx.update_transfer_shops(transfer_id, input.source_shop_id, input.destination_shop_id)
        .await?;
    tx.replace_transfer_items(transfer_id, &input.items).await?;

    let updated = lock_transfer(tx, transfer_id).await?;
    Ok((previous, updated))
}

async fn complete_in(tx: &mut dyn LedgerTx, transfer_id: TransferId) -> AppResult<InventoryTransfer> {
    let transfer = lock_transfer(tx, transfer_id).await?;
    require_transition(&transfer, TransferStatus::Completed)?;

    let items = tx.transfer_items(transfer_id).await?;
    valuation::lock_products(tx, items.iter().map(|i| i.product_id)).await?;
    let mut touched: Vec<ProductId> = Vec::with_capacity(items.len());

    for item in &items {
        // Re-read under lock; the level may have drifted while pending
        let mut source = tx
            .lock_inventory_item(transfer.from_shop_id, item.product_id)
            .await?
            .unwrap_or_else(|| InventoryItem::empty(transfer.from_shop_id, item.product_id));

        if source.quantity < item.quantity {
            tracing::warn!(
                "Transfer {} rejected: product {} has {} in shop {}, {} requested",
                transfer_id,
                item.product_id,
                source.quantity,
                transfer.from_shop_id,
                item.quantity
            );
            return Err(AppError::InsufficientInventory {
                product_id: item.product_id,
                shop_id: transfer.from_shop_id,
                available: source.quantity,
                requested: item.quantity,
            });
        }

        let unit_cost = source.shop_specific_cost;
        source.quantity -= item.quantity;
        source.release(item.quantity);
        tx.save_inventory_item(&source).await?;

        valuation::receive_stock(
            tx,
            transfer.to_shop_id,
            item.product_id,
            item.quantity,
            unit_cost,
        )
        .await?;
        touched.push(item.product_id);
    }

    valuation::recalculate_global_costs(tx, &touched).await?;
    tx.set_transfer_status(transfer_id, TransferStatus::Completed)
        .await
}

async fn cancel_in(tx: &mut dyn LedgerTx, transfer_id: TransferId) -> AppResult<InventoryTransfer> {
    let transfer = lock_transfer(tx, transfer_id).await?;
    require_transition(&transfer, TransferStatus::Cancelled)?;

    let items = tx.transfer_items(transfer_id).await?;
    valuation::lock_products(tx, items.iter().map(|i| i.product_id)).await?;
    release(tx, transfer.from_shop_id, &items).await?;
    tx.set_transfer_status(transfer_id, TransferStatus::Cancelled)
        .await
}

async fn delete_in(tx: &mut dyn LedgerTx, transfer_id: TransferId) -> AppResult<InventoryTransfer> {
    let transfer = lock_transfer(tx, transfer_id).await?;
    require_pending(&transfer, "deleted")?;

    let items = tx.transfer_items(transfer_id).await?;
    valuation::lock_products(tx, items.iter().map(|i| i.product_id)).await?;
    release(tx, transfer.from_shop_id, &items).await?;
    tx.delete_transfer(transfer_id).await?;
    Ok(transfer)
}

async fn lock_transfer(tx: &mut dyn LedgerTx, transfer_id: TransferId) -> AppResult<InventoryTransfer> {
    tx.lock_transfer(transfer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transfer {}", transfer_id)))
}

async fn require_shop(tx: &mut dyn LedgerTx, shop_id: ShopId) -> AppResult<()> {
    match tx.get_shop(shop_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("Shop {}", shop_id))),
    }
}

fn require_transition(transfer: &InventoryTransfer, next: TransferStatus) -> AppResult<()> {
    if transfer.status.can_transition_to(next) {
        return Ok(());
    }
    tracing::warn!(
        "Transfer {} is {}, refusing transition to {}",
        transfer.id,
        transfer.status,
        next
    );
    Err(AppError::InvalidStateTransition(format!(
        "Transfer {} is already {} and cannot become {}",
        transfer.id, transfer.status, next
    )))
}

fn require_pending(transfer: &InventoryTransfer, verb: &str) -> AppResult<()> {
    if transfer.status == TransferStatus::Pending {
        return Ok(());
    }
    tracing::warn!("Transfer {} is {}, refusing to modify it", transfer.id, transfer.status);
    Err(AppError::InvalidStateTransition(format!(
        "Transfer {} is {}; only pending transfers can be {}",
        transfer.id, transfer.status, verb
    )))
}

/// Check availability in the source shop and hold the quantities.
/// The products must already be locked.
async fn reserve(tx: &mut dyn LedgerTx, shop_id: ShopId, items: &[TransferItemInput]) -> AppResult<()> {
    for item in items {
        let mut stock = tx
            .lock_inventory_item(shop_id, item.product_id)
            .await?
            .unwrap_or_else(|| InventoryItem::empty(shop_id, item.product_id));

        let available = stock.available();
        if available < item.quantity {
            tracing::warn!(
                "Cannot reserve {} x product {} in shop {}: {} available",
                item.quantity,
                item.product_id,
                shop_id,
                available
            );
            return Err(AppError::InsufficientInventory {
                product_id: item.product_id,
                shop_id,
                available,
                requested: item.quantity,
            });
        }

        stock.reserved_quantity += item.quantity;
        tx.save_inventory_item(&stock).await?;
    }
    Ok(())
}

async fn release(tx: &mut dyn LedgerTx, shop_id: ShopId, items: &[TransferItem]) -> AppResult<()> {
    for item in items {
        if let Some(mut stock) = tx.lock_inventory_item(shop_id, item.product_id).await? {
            stock.release(item.quantity);
            tx.save_inventory_item(&stock).await?;
        }
    }
    Ok(())
}
