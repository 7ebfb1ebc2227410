//! Purchase Distribution Engine
//!
//! Draft invoices carry per-item shop allocations that are validated and
//! resolved when the invoice is written. Receiving an invoice books every
//! allocation into its shop at the invoice's unit cost, then runs the global
//! cost pass for each touched product. An invoice is received exactly once.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use shared::{
    validate_invoice_input, DistributionValidator, InvoiceId, InvoiceStatus, ProductId,
    PurchaseInvoice, PurchaseInvoiceInput, PurchaseInvoiceItem, ResolvedAllocation,
    ShopAllocation, ShopId,
};

use super::valuation;
use crate::cache::CacheLayer;
use crate::error::{AppError, AppResult};
use crate::ledger::{with_transaction, LedgerStore, LedgerTx};

#[derive(Clone)]
pub struct PurchaseService {
    ledger: Arc<dyn LedgerStore>,
    cache: Arc<CacheLayer>,
    timeout: Duration,
}

impl PurchaseService {
    pub fn new(ledger: Arc<dyn LedgerStore>, cache: Arc<CacheLayer>, timeout: Duration) -> Self {
        Self {
            ledger,
            cache,
            timeout,
        }
    }

    /// Create a draft invoice with validated shop allocations
    pub async fn create(&self, input: PurchaseInvoiceInput) -> AppResult<PurchaseInvoice> {
        validate_invoice_input(&input)?;

        let invoice = with_transaction(self.ledger.as_ref(), self.timeout, move |tx| {
            create_in(tx, input).boxed()
        })
        .await?;

        tracing::info!(
            "Created purchase invoice {} with {} items",
            invoice.id,
            invoice.items.len()
        );
        Ok(invoice)
    }

    /// Replace the supplier, items and allocations of a draft invoice
    pub async fn update(
        &self,
        invoice_id: InvoiceId,
        input: PurchaseInvoiceInput,
    ) -> AppResult<PurchaseInvoice> {
        validate_invoice_input(&input)?;

        let invoice = with_transaction(self.ledger.as_ref(), self.timeout, move |tx| {
            update_in(tx, invoice_id, input).boxed()
        })
        .await?;

        tracing::info!("Updated purchase invoice {}", invoice_id);
        Ok(invoice)
    }

    /// Post the invoice into inventory
    pub async fn receive(&self, invoice_id: InvoiceId) -> AppResult<PurchaseInvoice> {
        let invoice = with_transaction(self.ledger.as_ref(), self.timeout, move |tx| {
            receive_in(tx, invoice_id).boxed()
        })
        .await?;

        let shops: BTreeSet<ShopId> = invoice
            .items
            .iter()
            .flat_map(|item| item.allocations.iter().map(|a| a.shop_id))
            .collect();
        self.cache
            .invalidate_shops(&shops.into_iter().collect::<Vec<_>>());

        tracing::info!("Received purchase invoice {}", invoice_id);
        Ok(invoice)
    }

    pub async fn get(&self, invoice_id: InvoiceId) -> AppResult<PurchaseInvoice> {
        self.ledger
            .invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Purchase invoice {}", invoice_id)))
    }
}

async fn create_in(
    tx: &mut dyn LedgerTx,
    input: PurchaseInvoiceInput,
) -> AppResult<PurchaseInvoice> {
    let items = resolve_items(tx, &input).await?;
    tx.insert_invoice(input.supplier_id, &items).await
}

async fn update_in(
    tx: &mut dyn LedgerTx,
    invoice_id: InvoiceId,
    input: PurchaseInvoiceInput,
) -> AppResult<PurchaseInvoice> {
    let invoice = lock_invoice(tx, invoice_id).await?;
    if invoice.status != InvoiceStatus::Draft {
        tracing::warn!("Purchase invoice {} is {}, refusing edit", invoice_id, invoice.status);
        return Err(AppError::InvalidStateTransition(format!(
            "Purchase invoice {} has been received and can no longer be edited",
            invoice_id
        )));
    }

    let items = resolve_items(tx, &input).await?;
    tx.replace_invoice(invoice_id, input.supplier_id, &items).await
}

async fn receive_in(tx: &mut dyn LedgerTx, invoice_id: InvoiceId) -> AppResult<PurchaseInvoice> {
    let invoice = lock_invoice(tx, invoice_id).await?;
    if invoice.status != InvoiceStatus::Draft {
        tracing::warn!("Purchase invoice {} already received", invoice_id);
        return Err(AppError::InvalidStateTransition(format!(
            "Purchase invoice {} has already been received",
            invoice_id
        )));
    }

    valuation::lock_products(tx, invoice.items.iter().map(|i| i.product_id)).await?;

    let mut touched: Vec<ProductId> = Vec::with_capacity(invoice.items.len());
    for (item_index, item) in invoice.items.iter().enumerate() {
        let distributed = item.allocated_quantity();
        if distributed != item.quantity as i64 {
            tracing::warn!(
                "Purchase invoice {} item {} distributes {} of {}",
                invoice_id,
                item_index,
                distributed,
                item.quantity
            );
            return Err(AppError::DistributionMismatch {
                item_index,
                required: item.quantity as i64,
                distributed,
            });
        }

        for allocation in &item.allocations {
            valuation::receive_stock(
                tx,
                allocation.shop_id,
                item.product_id,
                allocation.quantity,
                item.unit_cost,
            )
            .await?;
        }
        touched.push(item.product_id);
    }

    valuation::recalculate_global_costs(tx, &touched).await?;
    tx.set_invoice_status(invoice_id, InvoiceStatus::Received)
        .await
}

async fn lock_invoice(tx: &mut dyn LedgerTx, invoice_id: InvoiceId) -> AppResult<PurchaseInvoice> {
    tx.lock_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Purchase invoice {}", invoice_id)))
}

/// Validate the distribution against the current shops and catalog
async fn resolve_items(
    tx: &mut dyn LedgerTx,
    input: &PurchaseInvoiceInput,
) -> AppResult<Vec<PurchaseInvoiceItem>> {
    let shops = tx.list_shops().await?;
    let product_ids: Vec<ProductId> = input.items.iter().map(|i| i.product_id).collect();
    let known_products = tx.existing_products(&product_ids).await?;

    let allocations = DistributionValidator::new(&shops, known_products)
        .validate(&input.items, &input.distribution)
        .map_err(|err| {
            tracing::warn!("Rejected purchase distribution: {}", err);
            AppError::from(err)
        })?;

    Ok(attach_allocations(input, &allocations))
}

fn attach_allocations(
    input: &PurchaseInvoiceInput,
    allocations: &[ResolvedAllocation],
) -> Vec<PurchaseInvoiceItem> {
    input
        .items
        .iter()
        .enumerate()
        .map(|(item_index, item)| PurchaseInvoiceItem {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_cost: item.unit_cost,
            allocations: allocations
                .iter()
                .filter(|a| a.item_index == item_index)
                .map(|a| ShopAllocation {
                    shop_id: a.shop_id,
                    quantity: a.quantity,
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::InvoiceItemInput;

    #[test]
    fn test_allocations_attach_to_their_items() {
        let input = PurchaseInvoiceInput {
            supplier_id: 1,
            items: vec![
                InvoiceItemInput {
                    product_id: 10,
                    quantity: 4,
                    unit_cost: Decimal::from(3),
                },
                InvoiceItemInput {
                    product_id: 11,
                    quantity: 2,
                    unit_cost: Decimal::from(5),
                },
            ],
            distribution: Default::default(),
        };
        let allocations = vec![
            ResolvedAllocation {
                item_index: 0,
                product_id: 10,
                shop_id: 1,
                quantity: 3,
            },
            ResolvedAllocation {
                item_index: 1,
                product_id: 11,
                shop_id: 2,
                quantity: 2,
            },
            ResolvedAllocation {
                item_index: 0,
                product_id: 10,
                shop_id: 2,
                quantity: 1,
            },
        ];

        let items = attach_allocations(&input, &allocations);
        assert_eq!(items[0].allocated_quantity(), 4);
        assert_eq!(items[0].allocations.len(), 2);
        assert_eq!(items[1].allocations, vec![ShopAllocation { shop_id: 2, quantity: 2 }]);
    }
}
