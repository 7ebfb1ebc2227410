//! Input validation for ledger mutations
//!
//! These checks run before any transaction opens. Each failure names the
//! offending field so the HTTP layer can report it precisely.

use std::collections::HashSet;

use validator::{Validate, ValidationErrors};

use crate::models::{PurchaseInvoiceInput, TransferInput};

/// A rejected input field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl From<ValidationErrors> for FieldError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                FieldError::new(*field, message)
            }
            None => FieldError::new("body", "Invalid request"),
        }
    }
}

/// Validate the body of a transfer create/replace request
pub fn validate_transfer_input(input: &TransferInput) -> Result<(), FieldError> {
    input.validate()?;

    if input.source_shop_id == input.destination_shop_id {
        return Err(FieldError::new(
            "destinationShopId",
            "Source and destination shop must be different",
        ));
    }

    let mut seen = HashSet::new();
    for (index, item) in input.items.iter().enumerate() {
        item.validate()
            .map_err(|e| prefix_item_field(FieldError::from(e), index))?;

        if !seen.insert(item.product_id) {
            return Err(FieldError::new(
                format!("items[{}].productId", index),
                format!("Product {} appears more than once", item.product_id),
            ));
        }
    }

    Ok(())
}

/// Validate the shape of a purchase invoice request.
///
/// Distribution sums are checked separately by the distribution validator,
/// which needs the configured shops.
pub fn validate_invoice_input(input: &PurchaseInvoiceInput) -> Result<(), FieldError> {
    input.validate()?;

    for (index, item) in input.items.iter().enumerate() {
        item.validate()
            .map_err(|e| prefix_item_field(FieldError::from(e), index))?;

        if item.unit_cost.is_sign_negative() && !item.unit_cost.is_zero() {
            return Err(FieldError::new(
                format!("items[{}].unitCost", index),
                format!("Unit cost {} cannot be negative", item.unit_cost),
            ));
        }
    }

    Ok(())
}

fn prefix_item_field(error: FieldError, index: usize) -> FieldError {
    FieldError::new(format!("items[{}].{}", index, error.field), error.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceItemInput, TransferItemInput};
    use rust_decimal::Decimal;

    fn transfer(source: i64, destination: i64, items: Vec<(i64, i32)>) -> TransferInput {
        TransferInput {
            source_shop_id: source,
            destination_shop_id: destination,
            items: items
                .into_iter()
                .map(|(product_id, quantity)| TransferItemInput { product_id, quantity })
                .collect(),
        }
    }

    #[test]
    fn test_valid_transfer() {
        assert!(validate_transfer_input(&transfer(1, 2, vec![(10, 3), (11, 1)])).is_ok());
    }

    #[test]
    fn test_same_shop_rejected() {
        let err = validate_transfer_input(&transfer(1, 1, vec![(10, 3)])).unwrap_err();
        assert_eq!(err.field, "destinationShopId");
    }

    #[test]
    fn test_empty_items_rejected() {
        let err = validate_transfer_input(&transfer(1, 2, vec![])).unwrap_err();
        assert_eq!(err.field, "items");
        assert_eq!(err.message, "Transfer must contain at least one item");
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let err = validate_transfer_input(&transfer(1, 2, vec![(10, 3), (11, 0)])).unwrap_err();
        assert_eq!(err.field, "items[1].quantity");

        let err = validate_transfer_input(&transfer(1, 2, vec![(10, -4)])).unwrap_err();
        assert_eq!(err.field, "items[0].quantity");
    }

    #[test]
    fn test_duplicate_product_rejected() {
        let err = validate_transfer_input(&transfer(1, 2, vec![(10, 3), (10, 1)])).unwrap_err();
        assert_eq!(err.field, "items[1].productId");
    }

    #[test]
    fn test_invoice_negative_cost_rejected() {
        let input = PurchaseInvoiceInput {
            supplier_id: 1,
            items: vec![InvoiceItemInput {
                product_id: 1,
                quantity: 2,
                unit_cost: Decimal::from(-3),
            }],
            distribution: Default::default(),
        };
        let err = validate_invoice_input(&input).unwrap_err();
        assert_eq!(err.field, "items[0].unitCost");
    }
}
