//! Per-shop inventory models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ProductId, ShopId};

/// Stock of one product in one shop, keyed by (shop_id, product_id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub quantity: i32,
    /// Units held back for pending outbound transfers
    pub reserved_quantity: i32,
    /// Weighted-average cost local to this shop
    pub shop_specific_cost: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// A row created on first stock arrival
    pub fn empty(shop_id: ShopId, product_id: ProductId) -> Self {
        Self {
            shop_id,
            product_id,
            quantity: 0,
            reserved_quantity: 0,
            shop_specific_cost: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    /// Quantity not held by a pending transfer
    pub fn available(&self) -> i32 {
        (self.quantity - self.reserved_quantity).max(0)
    }

    pub fn total_value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.shop_specific_cost
    }

    /// Release up to `quantity` reserved units, never going below zero
    pub fn release(&mut self, quantity: i32) {
        self.reserved_quantity = (self.reserved_quantity - quantity).max(0);
    }
}

/// Shop-level stock projection served by `GET /shops/{id}/inventory`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopInventoryLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub shop_specific_cost: Decimal,
    pub total_value: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_excludes_reserved() {
        let mut item = InventoryItem::empty(1, 1);
        item.quantity = 10;
        item.reserved_quantity = 4;
        assert_eq!(item.available(), 6);
    }

    #[test]
    fn test_available_never_negative_after_drift() {
        let mut item = InventoryItem::empty(1, 1);
        item.quantity = 2;
        item.reserved_quantity = 5;
        assert_eq!(item.available(), 0);
    }

    #[test]
    fn test_release_saturates() {
        let mut item = InventoryItem::empty(1, 1);
        item.reserved_quantity = 3;
        item.release(5);
        assert_eq!(item.reserved_quantity, 0);
    }
}
