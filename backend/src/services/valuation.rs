//! Cost recalculation steps shared by transfer completion and invoice posting
//!
//! Every step runs under the product's row lock. Holding it for the whole
//! unit of work means the global pass sees every committed shop of the
//! product and no other writer can change one until this unit commits.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use shared::{global_weighted_average_cost, CostPool, InventoryItem, ProductId, ShopId, WacError};

use crate::error::{AppError, AppResult};
use crate::ledger::LedgerTx;

/// Lock the distinct `products` in ascending id order; fails on an unknown id
pub async fn lock_products<I>(tx: &mut dyn LedgerTx, products: I) -> AppResult<()>
where
    I: IntoIterator<Item = ProductId>,
{
    let distinct: Vec<ProductId> = products
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let found = tx.lock_products(&distinct).await?;

    match distinct.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(AppError::NotFound(format!("Product {}", missing))),
        None => Ok(()),
    }
}

/// Book `quantity` units at `unit_cost` into a shop, recomputing the shop's
/// own weighted-average cost. Creates the inventory row on first arrival.
///
/// Callers booking several products lock them all first with
/// [`lock_products`]; the lock taken here is then already held.
pub async fn receive_stock(
    tx: &mut dyn LedgerTx,
    shop_id: ShopId,
    product_id: ProductId,
    quantity: i32,
    unit_cost: Decimal,
) -> AppResult<InventoryItem> {
    lock_products(tx, [product_id]).await?;
    let mut item = tx.lock_or_insert_inventory_item(shop_id, product_id).await?;

    let mut pool = CostPool::new(item.quantity as i64, item.shop_specific_cost);
    pool.receive(quantity as i64, unit_cost)?;

    item.quantity = i32::try_from(pool.quantity).map_err(|_| WacError::Overflow)?;
    item.shop_specific_cost = pool.unit_cost;
    tx.save_inventory_item(&item).await?;

    tracing::debug!(
        "Shop {} received {} x product {} at {}, shop cost now {}",
        shop_id,
        quantity,
        product_id,
        unit_cost,
        item.shop_specific_cost
    );
    Ok(item)
}

/// Recompute a product's global cost from every shop currently holding it
pub async fn recalculate_global_cost(
    tx: &mut dyn LedgerTx,
    product_id: ProductId,
) -> AppResult<Decimal> {
    lock_products(tx, [product_id]).await?;
    let items = tx.inventory_for_product(product_id).await?;
    let cost = global_weighted_average_cost(
        items
            .iter()
            .map(|item| (item.quantity as i64, item.shop_specific_cost)),
    )?;
    tx.set_product_cost(product_id, cost).await?;
    Ok(cost)
}

/// Run the global pass once for each distinct product
pub async fn recalculate_global_costs(
    tx: &mut dyn LedgerTx,
    products: &[ProductId],
) -> AppResult<()> {
    let distinct: BTreeSet<ProductId> = products.iter().copied().collect();
    for product_id in distinct {
        recalculate_global_cost(tx, product_id).await?;
    }
    Ok(())
}
