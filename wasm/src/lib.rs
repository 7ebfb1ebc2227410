//! WebAssembly module for the Retail Inventory platform
//!
//! Provides client-side previews for the purchase invoice form:
//! - Shop-specific and global weighted-average cost
//! - Distribution sum checks before the invoice is submitted

use std::str::FromStr;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::wac::*;

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value).map_err(|e| format!("Invalid {} '{}': {}", field, value, e))
}

fn preview_cost(
    existing_qty: i32,
    existing_cost: &str,
    incoming_qty: i32,
    incoming_cost: &str,
) -> Result<String, String> {
    let existing_cost = parse_decimal("existing cost", existing_cost)?;
    let incoming_cost = parse_decimal("incoming cost", incoming_cost)?;
    weighted_average_cost(
        existing_qty as i64,
        existing_cost,
        incoming_qty as i64,
        incoming_cost,
    )
    .map(|cost| cost.normalize().to_string())
    .map_err(|e| e.to_string())
}

/// Preview a shop's new unit cost after receiving stock.
///
/// Costs are passed as decimal strings to avoid float rounding in JS.
#[wasm_bindgen]
pub fn calculate_shop_cost(
    existing_qty: i32,
    existing_cost: &str,
    incoming_qty: i32,
    incoming_cost: &str,
) -> Result<String, JsValue> {
    preview_cost(existing_qty, existing_cost, incoming_qty, incoming_cost)
        .map_err(|e| JsValue::from_str(&e))
}

fn preview_global_cost(pools_json: &str) -> Result<String, String> {
    let pools: Vec<CostPool> =
        serde_json::from_str(pools_json).map_err(|e| format!("Invalid pools JSON: {}", e))?;
    global_weighted_average_cost(pools.iter().map(|p| (p.quantity, p.unit_cost)))
        .map(|cost| cost.normalize().to_string())
        .map_err(|e| e.to_string())
}

/// Preview the global cost across shops given `[{quantity, unit_cost}]`
#[wasm_bindgen]
pub fn calculate_global_cost(pools_json: &str) -> Result<String, JsValue> {
    preview_global_cost(pools_json).map_err(|e| JsValue::from_str(&e))
}

/// Check that shop allocations add up to the invoiced quantity
#[wasm_bindgen]
pub fn distribution_matches(item_quantity: i32, allocations: &[i32]) -> bool {
    allocations.iter().all(|q| *q >= 0)
        && allocations.iter().map(|q| *q as i64).sum::<i64>() == item_quantity as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_cost_preview() {
        assert_eq!(preview_cost(10, "100", 5, "130").unwrap(), "110");
        assert!(preview_cost(10, "abc", 5, "130").is_err());
        assert!(preview_cost(10, "100", 0, "130").is_err());
    }

    #[test]
    fn test_global_cost_preview() {
        let cost = preview_global_cost(
            r#"[{"quantity":4,"unit_cost":"10"},{"quantity":4,"unit_cost":"20"},{"quantity":0,"unit_cost":"99"}]"#,
        )
        .unwrap();
        assert_eq!(cost, "15");
    }

    #[test]
    fn test_distribution_matches() {
        assert!(distribution_matches(10, &[6, 4]));
        assert!(!distribution_matches(10, &[6, 5]));
        assert!(!distribution_matches(2, &[3, -1]));
    }
}
