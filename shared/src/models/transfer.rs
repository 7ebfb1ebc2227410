//! Inventory transfer models and the transfer state machine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::{ProductId, ShopId, TransferId};

/// Status of an inventory transfer
///
/// `Pending` is the only non-terminal state. `Completed` and `Cancelled`
/// accept no further transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }

    /// Check whether `self -> next` is an allowed transition
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Pending, TransferStatus::Completed)
                | (TransferStatus::Pending, TransferStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "completed" => Ok(TransferStatus::Completed),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(format!("unknown transfer status '{}'", other)),
        }
    }
}

/// A stock movement between two shops
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryTransfer {
    pub id: TransferId,
    pub from_shop_id: ShopId,
    pub to_shop_id: ShopId,
    pub status: TransferStatus,
    pub initiated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One requested product line of a transfer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferItem {
    pub id: i64,
    pub transfer_id: TransferId,
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Transfer detail projection served by `GET /transfers/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferDetail {
    pub id: TransferId,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub source_shop_id: ShopId,
    pub destination_shop_id: ShopId,
    pub source_shop_name: String,
    pub destination_shop_name: String,
    pub initiated_by: Option<Uuid>,
    pub items: Vec<TransferItemDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferItemDetail {
    pub id: i64,
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// Body of `POST /transfers` and `PUT /transfers/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransferInput {
    pub source_shop_id: ShopId,
    pub destination_shop_id: ShopId,
    #[validate(length(min = 1, message = "Transfer must contain at least one item"))]
    pub items: Vec<TransferItemInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferItemInput {
    pub product_id: ProductId,
    #[validate(range(min = 1, message = "Item quantity must be greater than zero"))]
    pub quantity: i32,
}

/// Body of `PATCH /transfers/{id}`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TransferAction {
    Complete,
    Cancel,
}

impl TransferAction {
    /// Status the transfer moves to when the action succeeds
    pub fn target_status(&self) -> TransferStatus {
        match self {
            TransferAction::Complete => TransferStatus::Completed,
            TransferAction::Cancel => TransferStatus::Cancelled,
        }
    }
}

/// Query string of `GET /transfers`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    pub shop_id: Option<ShopId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Cancelled.is_terminal());
        assert!(!TransferStatus::Pending.is_terminal());
    }

    #[test]
    fn test_only_pending_transitions() {
        use TransferStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        for from in [Completed, Cancelled] {
            for to in [Pending, Completed, Cancelled] {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TransferStatus::Pending,
            TransferStatus::Completed,
            TransferStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<TransferStatus>(), Ok(status));
        }
        assert!("shipped".parse::<TransferStatus>().is_err());
    }

    #[test]
    fn test_action_body_parsing() {
        let action: TransferAction = serde_json::from_str(r#"{"action":"complete"}"#).unwrap();
        assert_eq!(action, TransferAction::Complete);
        assert_eq!(action.target_status(), TransferStatus::Completed);

        let action: TransferAction = serde_json::from_str(r#"{"action":"cancel"}"#).unwrap();
        assert_eq!(action.target_status(), TransferStatus::Cancelled);

        assert!(serde_json::from_str::<TransferAction>(r#"{"action":"ship"}"#).is_err());
    }

    #[test]
    fn test_transfer_input_camel_case() {
        let input: TransferInput = serde_json::from_str(
            r#"{"sourceShopId":1,"destinationShopId":2,"items":[{"productId":9,"quantity":3}]}"#,
        )
        .unwrap();
        assert_eq!(input.source_shop_id, 1);
        assert_eq!(input.destination_shop_id, 2);
        assert_eq!(
            input.items,
            vec![TransferItemInput {
                product_id: 9,
                quantity: 3
            }]
        );
    }
}
