//! Product catalog models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// A sellable product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    /// Retail price
    pub price: Decimal,
    /// Global weighted-average cost across every shop holding stock
    pub weighted_average_cost: Decimal,
}
