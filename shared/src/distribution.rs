//! Purchase invoice shop-distribution validation
//!
//! A purchase invoice line only reaches inventory once its per-shop
//! allocations add up exactly to the invoiced quantity. The validator is pure:
//! it receives the configured shops and known product ids and returns the
//! resolved `(item, shop, quantity)` allocations.

use std::collections::HashSet;

use thiserror::Error;

use crate::models::{default_shop, DistributionMap, InvoiceItemInput, Shop};
use crate::types::{ProductId, ShopId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("Shop {shop_id} referenced by item {item_index} does not exist")]
    UnknownShop { item_index: usize, shop_id: ShopId },

    #[error("Product {product_id} referenced by item {item_index} does not exist")]
    UnknownProduct {
        item_index: usize,
        product_id: ProductId,
    },

    #[error("Distribution references item {item_index}, but the invoice has {item_count} items")]
    UnknownItem { item_index: usize, item_count: usize },

    #[error("Allocation of {quantity} to shop {shop_id} for item {item_index} cannot be negative")]
    NegativeAllocation {
        item_index: usize,
        shop_id: ShopId,
        quantity: i32,
    },

    #[error("{}", mismatch_message(.item_index, .required, .distributed))]
    DistributionMismatch {
        item_index: usize,
        required: i64,
        distributed: i64,
    },

    #[error("No shops are configured to receive stock")]
    NoShopsConfigured,

    #[error("Item {item_index} has no shop distribution and no default shop is configured")]
    DistributionRequired { item_index: usize },
}

/// Human-readable description of a distribution sum mismatch
pub fn mismatch_message(item_index: &usize, required: &i64, distributed: &i64) -> String {
    if distributed > required {
        format!(
            "Distributed quantity {} exceeds item quantity {} (item {})",
            distributed, required, item_index
        )
    } else {
        format!(
            "Distributed quantity {} is less than item quantity {} (item {})",
            distributed, required, item_index
        )
    }
}

/// One unit of work for the purchase posting step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAllocation {
    pub item_index: usize,
    pub product_id: ProductId,
    pub shop_id: ShopId,
    pub quantity: i32,
}

/// Validates invoice distributions against the configured shops and catalog
pub struct DistributionValidator<'a> {
    shops: &'a [Shop],
    shop_ids: HashSet<ShopId>,
    product_ids: HashSet<ProductId>,
}

impl<'a> DistributionValidator<'a> {
    pub fn new(shops: &'a [Shop], product_ids: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            shops,
            shop_ids: shops.iter().map(|s| s.id).collect(),
            product_ids: product_ids.into_iter().collect(),
        }
    }

    /// Validate `distribution` for `items` and resolve it into allocations.
    ///
    /// Zero-quantity entries are accepted but produce no allocation. Items
    /// without a distribution go entirely to the default shop when one exists.
    pub fn validate(
        &self,
        items: &[InvoiceItemInput],
        distribution: &DistributionMap,
    ) -> Result<Vec<ResolvedAllocation>, DistributionError> {
        if let Some((&item_index, _)) = distribution.range(items.len()..).next() {
            return Err(DistributionError::UnknownItem {
                item_index,
                item_count: items.len(),
            });
        }

        let mut resolved = Vec::new();

        for (item_index, item) in items.iter().enumerate() {
            if !self.product_ids.contains(&item.product_id) {
                return Err(DistributionError::UnknownProduct {
                    item_index,
                    product_id: item.product_id,
                });
            }

            match distribution.get(&item_index).filter(|shops| !shops.is_empty()) {
                Some(shops) => {
                    let mut distributed: i64 = 0;
                    for (&shop_id, &quantity) in shops {
                        if !self.shop_ids.contains(&shop_id) {
                            return Err(DistributionError::UnknownShop { item_index, shop_id });
                        }
                        if quantity < 0 {
                            return Err(DistributionError::NegativeAllocation {
                                item_index,
                                shop_id,
                                quantity,
                            });
                        }
                        distributed += quantity as i64;
                        if quantity > 0 {
                            resolved.push(ResolvedAllocation {
                                item_index,
                                product_id: item.product_id,
                                shop_id,
                                quantity,
                            });
                        }
                    }

                    let required = item.quantity as i64;
                    if distributed != required {
                        return Err(DistributionError::DistributionMismatch {
                            item_index,
                            required,
                            distributed,
                        });
                    }
                }
                None => {
                    if self.shops.is_empty() {
                        return Err(DistributionError::NoShopsConfigured);
                    }
                    let shop = default_shop(self.shops)
                        .ok_or(DistributionError::DistributionRequired { item_index })?;
                    resolved.push(ResolvedAllocation {
                        item_index,
                        product_id: item.product_id,
                        shop_id: shop.id,
                        quantity: item.quantity,
                    });
                }
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn shop(id: ShopId, is_default: bool) -> Shop {
        Shop {
            id,
            name: format!("Shop {}", id),
            is_default,
            created_at: Utc::now(),
        }
    }

    fn item(product_id: ProductId, quantity: i32) -> InvoiceItemInput {
        InvoiceItemInput {
            product_id,
            quantity,
            unit_cost: Decimal::from(10),
        }
    }

    fn dist(entries: Vec<(usize, Vec<(ShopId, i32)>)>) -> DistributionMap {
        entries
            .into_iter()
            .map(|(idx, shops)| (idx, shops.into_iter().collect::<BTreeMap<_, _>>()))
            .collect()
    }

    #[test]
    fn test_exact_distribution_resolves() {
        let shops = vec![shop(1, false), shop(2, false)];
        let validator = DistributionValidator::new(&shops, [100]);
        let resolved = validator
            .validate(&[item(100, 10)], &dist(vec![(0, vec![(1, 6), (2, 4)])]))
            .unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved.iter().map(|a| a.quantity as i64).sum::<i64>(), 10);
    }

    #[test]
    fn test_over_allocation_reports_required_and_distributed() {
        let shops = vec![shop(1, false), shop(2, false)];
        let validator = DistributionValidator::new(&shops, [100]);
        let err = validator
            .validate(&[item(100, 10)], &dist(vec![(0, vec![(1, 6), (2, 5)])]))
            .unwrap_err();

        assert_eq!(
            err,
            DistributionError::DistributionMismatch {
                item_index: 0,
                required: 10,
                distributed: 11
            }
        );
        assert_eq!(
            err.to_string(),
            "Distributed quantity 11 exceeds item quantity 10 (item 0)"
        );
    }

    #[test]
    fn test_under_allocation_rejected() {
        let shops = vec![shop(1, false)];
        let validator = DistributionValidator::new(&shops, [100]);
        let err = validator
            .validate(&[item(100, 5)], &dist(vec![(0, vec![(1, 3)])]))
            .unwrap_err();
        assert!(err.to_string().contains("is less than item quantity 5"));
    }

    #[test]
    fn test_unknown_shop_rejected() {
        let shops = vec![shop(1, false)];
        let validator = DistributionValidator::new(&shops, [100]);
        let err = validator
            .validate(&[item(100, 5)], &dist(vec![(0, vec![(9, 5)])]))
            .unwrap_err();
        assert_eq!(err, DistributionError::UnknownShop { item_index: 0, shop_id: 9 });
    }

    #[test]
    fn test_unknown_product_rejected() {
        let shops = vec![shop(1, true)];
        let validator = DistributionValidator::new(&shops, [100]);
        let err = validator.validate(&[item(555, 5)], &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, DistributionError::UnknownProduct { product_id: 555, .. }));
    }

    #[test]
    fn test_missing_distribution_uses_default_shop() {
        let shops = vec![shop(1, false), shop(2, true)];
        let validator = DistributionValidator::new(&shops, [100]);
        let resolved = validator.validate(&[item(100, 8)], &BTreeMap::new()).unwrap();
        assert_eq!(
            resolved,
            vec![ResolvedAllocation {
                item_index: 0,
                product_id: 100,
                shop_id: 2,
                quantity: 8
            }]
        );
    }

    #[test]
    fn test_missing_distribution_without_default() {
        let shops = vec![shop(1, false), shop(2, false)];
        let validator = DistributionValidator::new(&shops, [100]);
        let err = validator.validate(&[item(100, 8)], &BTreeMap::new()).unwrap_err();
        assert_eq!(err, DistributionError::DistributionRequired { item_index: 0 });
    }

    #[test]
    fn test_no_shops_configured() {
        let validator = DistributionValidator::new(&[], [100]);
        let err = validator.validate(&[item(100, 8)], &BTreeMap::new()).unwrap_err();
        assert_eq!(err, DistributionError::NoShopsConfigured);
    }

    #[test]
    fn test_distribution_for_missing_item_index() {
        let shops = vec![shop(1, false)];
        let validator = DistributionValidator::new(&shops, [100]);
        let err = validator
            .validate(&[item(100, 1)], &dist(vec![(0, vec![(1, 1)]), (3, vec![(1, 1)])]))
            .unwrap_err();
        assert_eq!(err, DistributionError::UnknownItem { item_index: 3, item_count: 1 });
    }

    #[test]
    fn test_zero_allocations_are_dropped() {
        let shops = vec![shop(1, false), shop(2, false)];
        let validator = DistributionValidator::new(&shops, [100]);
        let resolved = validator
            .validate(&[item(100, 4)], &dist(vec![(0, vec![(1, 0), (2, 4)])]))
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].shop_id, 2);
    }

    #[test]
    fn test_negative_allocation_rejected() {
        let shops = vec![shop(1, false), shop(2, false)];
        let validator = DistributionValidator::new(&shops, [100]);
        let err = validator
            .validate(&[item(100, 4)], &dist(vec![(0, vec![(1, -1), (2, 5)])]))
            .unwrap_err();
        assert!(matches!(err, DistributionError::NegativeAllocation { quantity: -1, .. }));
    }
}
