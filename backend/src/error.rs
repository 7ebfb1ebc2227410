//! Error handling for the Retail Inventory platform
//!
//! Every failure states which ledger rule it violated, with the concrete
//! numbers involved, because these are financial records.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{DistributionError, FieldError, ProductId, ShopId, WacError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions: requires {0}")]
    InsufficientPermissions(String),

    // Validation errors
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // State errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Consistency errors
    #[error(
        "Insufficient inventory for product {product_id} in shop {shop_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientInventory {
        product_id: ProductId,
        shop_id: ShopId,
        available: i32,
        requested: i32,
    },

    #[error("{}", shared::mismatch_message(.item_index, .required, .distributed))]
    DistributionMismatch {
        item_index: usize,
        required: i64,
        distributed: i64,
    },

    #[error("No shops are configured to receive stock")]
    NoShopsConfigured,

    #[error("Item {item_index} has no shop distribution and no default shop is configured")]
    DistributionRequired { item_index: usize },

    #[error("Cost calculation failed: {0}")]
    CostCalculation(#[from] WacError),

    // Infrastructure errors
    #[error("Transaction exceeded its {0}s time limit and was rolled back")]
    Timeout(u64),

    #[error("Transaction conflicted with a concurrent update and was rolled back: {0}")]
    Contention(String),

    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Infrastructure failures that leave no effect and may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Timeout(_) | AppError::Contention(_))
    }
}

/// PostgreSQL SQLSTATEs for a deadlock victim and a serialization failure
const CONTENTION_CODES: [&str; 2] = ["40P01", "40001"];

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let contended = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| CONTENTION_CODES.contains(&code.as_ref()));
        if contended {
            AppError::Contention(err.to_string())
        } else {
            AppError::DatabaseError(err)
        }
    }
}

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        AppError::Validation {
            field: err.field,
            message: err.message,
        }
    }
}

impl From<DistributionError> for AppError {
    fn from(err: DistributionError) -> Self {
        match err {
            DistributionError::UnknownShop { shop_id, .. } => {
                AppError::NotFound(format!("Shop {}", shop_id))
            }
            DistributionError::UnknownProduct { product_id, .. } => {
                AppError::NotFound(format!("Product {}", product_id))
            }
            DistributionError::UnknownItem { .. } | DistributionError::NegativeAllocation { .. } => {
                AppError::Validation {
                    field: "distribution".to_string(),
                    message: err.to_string(),
                }
            }
            DistributionError::DistributionMismatch {
                item_index,
                required,
                distributed,
            } => AppError::DistributionMismatch {
                item_index,
                required,
                distributed,
            },
            DistributionError::NoShopsConfigured => AppError::NoShopsConfigured,
            DistributionError::DistributionRequired { item_index } => {
                AppError::DistributionRequired { item_index }
            }
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token"),
            ),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            ),
            AppError::InsufficientPermissions(permission) => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    format!("Permission denied: requires {}", permission),
                ),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("INVALID_STATE_TRANSITION", msg.clone()),
            ),
            AppError::InsufficientInventory { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("INSUFFICIENT_INVENTORY", self.to_string()),
            ),
            AppError::DistributionMismatch { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "DISTRIBUTION_MISMATCH".to_string(),
                    message: self.to_string(),
                    field: Some("distribution".to_string()),
                },
            ),
            AppError::NoShopsConfigured => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("NO_SHOPS_CONFIGURED", self.to_string()),
            ),
            AppError::DistributionRequired { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "DISTRIBUTION_REQUIRED".to_string(),
                    message: self.to_string(),
                    field: Some("distribution".to_string()),
                },
            ),
            AppError::CostCalculation(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("COST_CALCULATION_ERROR", err.to_string()),
            ),
            AppError::Timeout(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new("TIMEOUT", self.to_string()),
            ),
            AppError::Contention(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new("TRANSACTION_CONFLICT", self.to_string()),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
