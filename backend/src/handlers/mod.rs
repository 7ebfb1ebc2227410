//! HTTP request handlers

pub mod health;
pub mod purchase;
pub mod shop;
pub mod transfer;

pub use health::*;
pub use purchase::*;
pub use shop::*;
pub use transfer::*;

use axum::extract::rejection::{JsonRejection, QueryRejection};

use crate::error::AppError;

/// Parse a path id, rejecting anything that is not a positive integer
pub(crate) fn parse_id(raw: &str, resource: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Validation {
            field: "id".to_string(),
            message: format!("Invalid {} id '{}'", resource, raw),
        }),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}
