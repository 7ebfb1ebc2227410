//! PostgreSQL ledger store
//!
//! Units of work map onto database transactions. Rows that a mutation depends
//! on are read with `SELECT ... FOR UPDATE`, so two writers touching the same
//! inventory row or transfer queue behind each other instead of interleaving.
//!
//! Lock order is transfer or invoice row, then product rows by ascending id,
//! then inventory rows. Inventory rows are only locked while their product
//! row is held.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    InventoryItem, InventoryTransfer, InvoiceId, InvoiceStatus, ProductId,
    PurchaseInvoice, PurchaseInvoiceItem, Shop, ShopAllocation, ShopId, ShopInventoryLine,
    SupplierId, TransferDetail, TransferFilter, TransferId, TransferItem, TransferItemDetail,
    TransferItemInput, TransferStatus,
};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx};
use crate::error::{AppError, AppResult};

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShopRow {
    id: i64,
    name: String,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Shop {
            id: row.id,
            name: row.name,
            is_default: row.is_default,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InventoryRow {
    shop_id: i64,
    product_id: i64,
    quantity: i32,
    reserved_quantity: i32,
    shop_specific_cost: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryItem {
    fn from(row: InventoryRow) -> Self {
        InventoryItem {
            shop_id: row.shop_id,
            product_id: row.product_id,
            quantity: row.quantity,
            reserved_quantity: row.reserved_quantity,
            shop_specific_cost: row.shop_specific_cost,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransferRow {
    id: i64,
    from_shop_id: i64,
    to_shop_id: i64,
    status: String,
    initiated_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransferRow> for InventoryTransfer {
    type Error = AppError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(InventoryTransfer {
            id: row.id,
            from_shop_id: row.from_shop_id,
            to_shop_id: row.to_shop_id,
            status: row.status.parse().map_err(AppError::Internal)?,
            initiated_by: row.initiated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransferItemRow {
    id: i64,
    transfer_id: i64,
    product_id: i64,
    quantity: i32,
}

impl From<TransferItemRow> for TransferItem {
    fn from(row: TransferItemRow) -> Self {
        TransferItem {
            id: row.id,
            transfer_id: row.transfer_id,
            product_id: row.product_id,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransferDetailRow {
    id: i64,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    source_shop_id: i64,
    destination_shop_id: i64,
    source_shop_name: String,
    destination_shop_name: String,
    initiated_by: Option<Uuid>,
}

#[derive(Debug, sqlx::FromRow)]
struct TransferItemDetailRow {
    id: i64,
    product_id: i64,
    product_name: String,
    sku: String,
    quantity: i32,
    price: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    supplier_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceItemRow {
    id: i64,
    product_id: i64,
    quantity: i32,
    unit_cost: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct AllocationRow {
    invoice_item_id: i64,
    shop_id: i64,
    quantity: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct ShopInventoryRow {
    product_id: i64,
    product_name: String,
    sku: String,
    quantity: i32,
    reserved_quantity: i32,
    shop_specific_cost: Decimal,
}

const TRANSFER_COLUMNS: &str = "id, from_shop_id, to_shop_id, status, initiated_by, \
                                created_at, updated_at, completed_at";

/// Load the items and allocations of an invoice row
async fn load_invoice(conn: &mut PgConnection, row: InvoiceRow) -> AppResult<PurchaseInvoice> {
    let item_rows = sqlx::query_as::<_, InvoiceItemRow>(
        r#"
        SELECT id, product_id, quantity, unit_cost
        FROM purchase_invoice_items
        WHERE invoice_id = $1
        ORDER BY line_no
        "#,
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    let allocation_rows = sqlx::query_as::<_, AllocationRow>(
        r#"
        SELECT d.invoice_item_id, d.shop_id, d.quantity
        FROM purchase_invoice_distributions d
        JOIN purchase_invoice_items i ON i.id = d.invoice_item_id
        WHERE i.invoice_id = $1
        ORDER BY d.invoice_item_id, d.shop_id
        "#,
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    let items = item_rows
        .into_iter()
        .map(|item| PurchaseInvoiceItem {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_cost: item.unit_cost,
            allocations: allocation_rows
                .iter()
                .filter(|a| a.invoice_item_id == item.id)
                .map(|a| ShopAllocation {
                    shop_id: a.shop_id,
                    quantity: a.quantity,
                })
                .collect(),
        })
        .collect();

    Ok(PurchaseInvoice {
        id: row.id,
        supplier_id: row.supplier_id,
        status: row.status.parse().map_err(AppError::Internal)?,
        items,
        created_at: row.created_at,
        received_at: row.received_at,
    })
}

async fn insert_invoice_items(
    conn: &mut PgConnection,
    invoice_id: InvoiceId,
    items: &[PurchaseInvoiceItem],
) -> AppResult<()> {
    for (line_no, item) in items.iter().enumerate() {
        let item_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO purchase_invoice_items (invoice_id, line_no, product_id, quantity, unit_cost)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(invoice_id)
        .bind(line_no as i32)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_cost)
        .fetch_one(&mut *conn)
        .await?;

        for allocation in &item.allocations {
            sqlx::query(
                r#"
                INSERT INTO purchase_invoice_distributions (invoice_item_id, shop_id, quantity)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(item_id)
            .bind(allocation.shop_id)
            .bind(allocation.quantity)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// A database transaction
struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn list_shops(&mut self) -> AppResult<Vec<Shop>> {
        let rows = sqlx::query_as::<_, ShopRow>(
            "SELECT id, name, is_default, created_at FROM shops ORDER BY id",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Shop::from).collect())
    }

    async fn get_shop(&mut self, shop_id: ShopId) -> AppResult<Option<Shop>> {
        let row = sqlx::query_as::<_, ShopRow>(
            "SELECT id, name, is_default, created_at FROM shops WHERE id = $1",
        )
        .bind(shop_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Shop::from))
    }

    async fn existing_products(&mut self, product_ids: &[ProductId]) -> AppResult<Vec<ProductId>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = ANY($1)")
            .bind(product_ids)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(ids)
    }

    async fn set_product_cost(&mut self, product_id: ProductId, cost: Decimal) -> AppResult<()> {
        let result = sqlx::query("UPDATE products SET weighted_average_cost = $2 WHERE id = $1")
            .bind(product_id)
            .bind(cost)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Product {}", product_id)));
        }
        Ok(())
    }

    async fn lock_products(&mut self, product_ids: &[ProductId]) -> AppResult<Vec<ProductId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(product_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    async fn lock_or_insert_inventory_item(
        &mut self,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> AppResult<InventoryItem> {
        // A concurrent insert of the same key makes this wait for that
        // transaction, then the select below sees its committed row
        sqlx::query(
            r#"
            INSERT INTO inventory_items (shop_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (shop_id, product_id) DO NOTHING
            "#,
        )
        .bind(shop_id)
        .bind(product_id)
        .execute(&mut *self.tx)
        .await?;

        let row = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT shop_id, product_id, quantity, reserved_quantity, shop_specific_cost, updated_at
            FROM inventory_items
            WHERE shop_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(shop_id)
        .bind(product_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn lock_inventory_item(
        &mut self,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> AppResult<Option<InventoryItem>> {
        let row = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT shop_id, product_id, quantity, reserved_quantity, shop_specific_cost, updated_at
            FROM inventory_items
            WHERE shop_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(shop_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(InventoryItem::from))
    }

    async fn save_inventory_item(&mut self, item: &InventoryItem) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items
                (shop_id, product_id, quantity, reserved_quantity, shop_specific_cost, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (shop_id, product_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                reserved_quantity = EXCLUDED.reserved_quantity,
                shop_specific_cost = EXCLUDED.shop_specific_cost,
                updated_at = NOW()
            "#,
        )
        .bind(item.shop_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.reserved_quantity)
        .bind(item.shop_specific_cost)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn inventory_for_product(&mut self, product_id: ProductId) -> AppResult<Vec<InventoryItem>> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT shop_id, product_id, quantity, reserved_quantity, shop_specific_cost, updated_at
            FROM inventory_items
            WHERE product_id = $1
            ORDER BY shop_id
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(InventoryItem::from).collect())
    }

    async fn insert_transfer(
        &mut self,
        from_shop_id: ShopId,
        to_shop_id: ShopId,
        initiated_by: Option<Uuid>,
    ) -> AppResult<InventoryTransfer> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            INSERT INTO inventory_transfers (from_shop_id, to_shop_id, status, initiated_by)
            VALUES ($1, $2, 'pending', $3)
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(from_shop_id)
        .bind(to_shop_id)
        .bind(initiated_by)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn lock_transfer(&mut self, transfer_id: TransferId) -> AppResult<Option<InventoryTransfer>> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {} FROM inventory_transfers WHERE id = $1 FOR UPDATE",
            TRANSFER_COLUMNS
        ))
        .bind(transfer_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(InventoryTransfer::try_from).transpose()
    }

    async fn transfer_items(&mut self, transfer_id: TransferId) -> AppResult<Vec<TransferItem>> {
        let rows = sqlx::query_as::<_, TransferItemRow>(
            r#"
            SELECT id, transfer_id, product_id, quantity
            FROM transfer_items
            WHERE transfer_id = $1
            ORDER BY id
            "#,
        )
        .bind(transfer_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(TransferItem::from).collect())
    }

    async fn update_transfer_shops(
        &mut self,
        transfer_id: TransferId,
        from_shop_id: ShopId,
        to_shop_id: ShopId,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE inventory_transfers
            SET from_shop_id = $2, to_shop_id = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(transfer_id)
        .bind(from_shop_id)
        .bind(to_shop_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn replace_transfer_items(
        &mut self,
        transfer_id: TransferId,
        items: &[TransferItemInput],
    ) -> AppResult<Vec<TransferItem>> {
        sqlx::query("DELETE FROM transfer_items WHERE transfer_id = $1")
            .bind(transfer_id)
            .execute(&mut *self.tx)
            .await?;

        let mut created = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, TransferItemRow>(
                r#"
                INSERT INTO transfer_items (transfer_id, product_id, quantity)
                VALUES ($1, $2, $3)
                RETURNING id, transfer_id, product_id, quantity
                "#,
            )
            .bind(transfer_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .fetch_one(&mut *self.tx)
            .await?;
            created.push(row.into());
        }
        Ok(created)
    }

    async fn set_transfer_status(
        &mut self,
        transfer_id: TransferId,
        status: TransferStatus,
    ) -> AppResult<InventoryTransfer> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            UPDATE inventory_transfers
            SET status = $2,
                updated_at = NOW(),
                completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE completed_at END
            WHERE id = $1
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(transfer_id)
        .bind(status.as_str())
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transfer {}", transfer_id)))?;
        row.try_into()
    }

    async fn delete_transfer(&mut self, transfer_id: TransferId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM inventory_transfers WHERE id = $1")
            .bind(transfer_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Transfer {}", transfer_id)));
        }
        Ok(())
    }

    async fn insert_invoice(
        &mut self,
        supplier_id: SupplierId,
        items: &[PurchaseInvoiceItem],
    ) -> AppResult<PurchaseInvoice> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            INSERT INTO purchase_invoices (supplier_id, status)
            VALUES ($1, 'draft')
            RETURNING id, supplier_id, status, created_at, received_at
            "#,
        )
        .bind(supplier_id)
        .fetch_one(&mut *self.tx)
        .await?;

        insert_invoice_items(&mut self.tx, row.id, items).await?;
        load_invoice(&mut self.tx, row).await
    }

    async fn lock_invoice(&mut self, invoice_id: InvoiceId) -> AppResult<Option<PurchaseInvoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, supplier_id, status, created_at, received_at
            FROM purchase_invoices
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(load_invoice(&mut self.tx, row).await?)),
            None => Ok(None),
        }
    }

    async fn replace_invoice(
        &mut self,
        invoice_id: InvoiceId,
        supplier_id: SupplierId,
        items: &[PurchaseInvoiceItem],
    ) -> AppResult<PurchaseInvoice> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            UPDATE purchase_invoices SET supplier_id = $2
            WHERE id = $1
            RETURNING id, supplier_id, status, created_at, received_at
            "#,
        )
        .bind(invoice_id)
        .bind(supplier_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Purchase invoice {}", invoice_id)))?;

        // Distributions cascade with their items
        sqlx::query("DELETE FROM purchase_invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *self.tx)
            .await?;
        insert_invoice_items(&mut self.tx, invoice_id, items).await?;
        load_invoice(&mut self.tx, row).await
    }

    async fn set_invoice_status(
        &mut self,
        invoice_id: InvoiceId,
        status: InvoiceStatus,
    ) -> AppResult<PurchaseInvoice> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            UPDATE purchase_invoices
            SET status = $2,
                received_at = CASE WHEN $2 = 'received' THEN NOW() ELSE received_at END
            WHERE id = $1
            RETURNING id, supplier_id, status, created_at, received_at
            "#,
        )
        .bind(invoice_id)
        .bind(status.as_str())
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Purchase invoice {}", invoice_id)))?;
        load_invoice(&mut self.tx, row).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn transfer_detail(&self, transfer_id: TransferId) -> AppResult<Option<TransferDetail>> {
        let row = sqlx::query_as::<_, TransferDetailRow>(
            r#"
            SELECT t.id, t.status, t.created_at, t.completed_at,
                   t.from_shop_id AS source_shop_id,
                   t.to_shop_id AS destination_shop_id,
                   src.name AS source_shop_name,
                   dst.name AS destination_shop_name,
                   t.initiated_by
            FROM inventory_transfers t
            JOIN shops src ON src.id = t.from_shop_id
            JOIN shops dst ON dst.id = t.to_shop_id
            WHERE t.id = $1
            "#,
        )
        .bind(transfer_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, TransferItemDetailRow>(
            r#"
            SELECT ti.id, ti.product_id, p.name AS product_name, p.sku, ti.quantity, p.price
            FROM transfer_items ti
            JOIN products p ON p.id = ti.product_id
            WHERE ti.transfer_id = $1
            ORDER BY ti.id
            "#,
        )
        .bind(transfer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(Some(TransferDetail {
            id: row.id,
            status: row.status.parse().map_err(AppError::Internal)?,
            created_at: row.created_at,
            completed_at: row.completed_at,
            source_shop_id: row.source_shop_id,
            destination_shop_id: row.destination_shop_id,
            source_shop_name: row.source_shop_name,
            destination_shop_name: row.destination_shop_name,
            initiated_by: row.initiated_by,
            items: items
                .into_iter()
                .map(|i| TransferItemDetail {
                    id: i.id,
                    product_id: i.product_id,
                    product_name: i.product_name,
                    sku: i.sku,
                    quantity: i.quantity,
                    price: i.price,
                })
                .collect(),
        }))
    }

    async fn list_transfers(&self, filter: &TransferFilter) -> AppResult<Vec<InventoryTransfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            SELECT {}
            FROM inventory_transfers
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR from_shop_id = $2 OR to_shop_id = $2)
            ORDER BY created_at DESC, id DESC
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.shop_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(InventoryTransfer::try_from).collect()
    }

    async fn invoice(&self, invoice_id: InvoiceId) -> AppResult<Option<PurchaseInvoice>> {
        let mut conn = self.db.acquire().await?;
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, supplier_id, status, created_at, received_at
            FROM purchase_invoices
            WHERE id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(load_invoice(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn list_shops(&self) -> AppResult<Vec<Shop>> {
        let rows = sqlx::query_as::<_, ShopRow>(
            "SELECT id, name, is_default, created_at FROM shops ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Shop::from).collect())
    }

    async fn shop_inventory(&self, shop_id: ShopId) -> AppResult<Option<Vec<ShopInventoryLine>>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shops WHERE id = $1)")
            .bind(shop_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Ok(None);
        }

        let rows = sqlx::query_as::<_, ShopInventoryRow>(
            r#"
            SELECT i.product_id, p.name AS product_name, p.sku,
                   i.quantity, i.reserved_quantity, i.shop_specific_cost
            FROM inventory_items i
            JOIN products p ON p.id = i.product_id
            WHERE i.shop_id = $1
            ORDER BY i.product_id
            "#,
        )
        .bind(shop_id)
        .fetch_all(&self.db)
        .await?;

        Ok(Some(
            rows.into_iter()
                .map(|r| ShopInventoryLine {
                    product_id: r.product_id,
                    product_name: r.product_name,
                    sku: r.sku,
                    quantity: r.quantity,
                    reserved_quantity: r.reserved_quantity,
                    shop_specific_cost: r.shop_specific_cost,
                    total_value: Decimal::from(r.quantity) * r.shop_specific_cost,
                })
                .collect(),
        ))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
