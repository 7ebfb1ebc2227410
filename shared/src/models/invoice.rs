//! Purchase invoice models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{InvoiceId, ProductId, ShopId, SupplierId};

/// Per-item shop allocation: `item index -> (shop id -> allocated quantity)`
pub type DistributionMap = BTreeMap<usize, BTreeMap<ShopId, i32>>;

/// Status of a purchase invoice
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Editable; stock has not been received
    Draft,
    /// Stock has been booked into the distributed shops
    Received,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Received => "received",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "received" => Ok(InvoiceStatus::Received),
            other => Err(format!("unknown invoice status '{}'", other)),
        }
    }
}

/// A purchase invoice with its resolved shop allocations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseInvoice {
    pub id: InvoiceId,
    pub supplier_id: SupplierId,
    pub status: InvoiceStatus,
    pub items: Vec<PurchaseInvoiceItem>,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseInvoiceItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub allocations: Vec<ShopAllocation>,
}

impl PurchaseInvoiceItem {
    pub fn allocated_quantity(&self) -> i64 {
        self.allocations.iter().map(|a| a.quantity as i64).sum()
    }

    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_cost
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShopAllocation {
    pub shop_id: ShopId,
    pub quantity: i32,
}

/// Body of `POST /purchase-invoices` and `PUT /purchase-invoices/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInvoiceInput {
    pub supplier_id: SupplierId,
    #[validate(length(min = 1, message = "Invoice must contain at least one item"))]
    pub items: Vec<InvoiceItemInput>,
    #[serde(default)]
    pub distribution: DistributionMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemInput {
    pub product_id: ProductId,
    #[validate(range(min = 1, message = "Item quantity must be greater than zero"))]
    pub quantity: i32,
    pub unit_cost: Decimal,
}
