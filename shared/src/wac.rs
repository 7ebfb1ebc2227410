//! Weighted-average cost (WAC) arithmetic
//!
//! All arithmetic is done in `rust_decimal::Decimal`, never in binary floating
//! point, so repeated recalculation cannot drift financial totals.
//!
//! Two scopes exist:
//! - shop-specific: one shop's (quantity, cost) pool absorbing incoming stock
//! - global: the quantity-weighted mean of every shop pool holding stock

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WacError {
    #[error("Existing quantity {0} cannot be negative")]
    NegativeExistingQuantity(i64),

    #[error("Incoming quantity {0} must be greater than zero")]
    NonPositiveIncomingQuantity(i64),

    #[error("Unit cost {0} cannot be negative")]
    NegativeCost(Decimal),

    #[error("Cost calculation overflowed")]
    Overflow,
}

/// Compute the weighted-average cost after `incoming_qty` units at
/// `incoming_cost` join a pool of `existing_qty` units at `existing_cost`.
///
/// `(eq*ec + iq*ic) / (eq+iq)`; returns zero when the combined quantity is zero.
pub fn weighted_average_cost(
    existing_qty: i64,
    existing_cost: Decimal,
    incoming_qty: i64,
    incoming_cost: Decimal,
) -> Result<Decimal, WacError> {
    if existing_qty < 0 {
        return Err(WacError::NegativeExistingQuantity(existing_qty));
    }
    if incoming_qty <= 0 {
        return Err(WacError::NonPositiveIncomingQuantity(incoming_qty));
    }
    if existing_cost.is_sign_negative() && !existing_cost.is_zero() {
        return Err(WacError::NegativeCost(existing_cost));
    }
    if incoming_cost.is_sign_negative() && !incoming_cost.is_zero() {
        return Err(WacError::NegativeCost(incoming_cost));
    }

    let total_qty = existing_qty + incoming_qty;
    if total_qty == 0 {
        return Ok(Decimal::ZERO);
    }

    let existing_value = Decimal::from(existing_qty)
        .checked_mul(existing_cost)
        .ok_or(WacError::Overflow)?;
    let incoming_value = Decimal::from(incoming_qty)
        .checked_mul(incoming_cost)
        .ok_or(WacError::Overflow)?;

    existing_value
        .checked_add(incoming_value)
        .and_then(|value| value.checked_div(Decimal::from(total_qty)))
        .ok_or(WacError::Overflow)
}

/// Global WAC over `(quantity, shop_specific_cost)` pools.
///
/// Pools with zero or negative quantity are ignored in both numerator and
/// denominator; a product nobody holds has a global cost of zero.
pub fn global_weighted_average_cost<I>(pools: I) -> Result<Decimal, WacError>
where
    I: IntoIterator<Item = (i64, Decimal)>,
{
    let mut total_qty: i64 = 0;
    let mut total_value = Decimal::ZERO;

    for (quantity, cost) in pools.into_iter().filter(|(q, _)| *q > 0) {
        let value = Decimal::from(quantity)
            .checked_mul(cost)
            .ok_or(WacError::Overflow)?;
        total_value = total_value.checked_add(value).ok_or(WacError::Overflow)?;
        total_qty = total_qty.checked_add(quantity).ok_or(WacError::Overflow)?;
    }

    if total_qty == 0 {
        return Ok(Decimal::ZERO);
    }

    total_value
        .checked_div(Decimal::from(total_qty))
        .ok_or(WacError::Overflow)
}

/// A (quantity, unit cost) cost pool
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CostPool {
    pub quantity: i64,
    pub unit_cost: Decimal,
}

impl CostPool {
    pub fn new(quantity: i64, unit_cost: Decimal) -> Self {
        Self { quantity, unit_cost }
    }

    /// Absorb incoming stock, recomputing the pool's unit cost
    pub fn receive(&mut self, quantity: i64, unit_cost: Decimal) -> Result<(), WacError> {
        self.unit_cost =
            weighted_average_cost(self.quantity.max(0), self.unit_cost, quantity, unit_cost)?;
        self.quantity = self.quantity.max(0) + quantity;
        Ok(())
    }

    pub fn value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_cost
    }
}
