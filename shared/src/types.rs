//! Common types used across the platform

use serde::{Deserialize, Serialize};

pub type ShopId = i64;
pub type ProductId = i64;
pub type TransferId = i64;
pub type InvoiceId = i64;
pub type SupplierId = i64;

/// Standard envelope for mutation responses: `{ message, data }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiMessage<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiMessage<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

/// Identifier-only payload, returned after replacing a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdPayload {
    pub id: i64,
}
