//! Shared types and domain logic for the Retail Inventory platform
//!
//! This crate holds everything that is pure computation: the ledger models,
//! the weighted-average-cost arithmetic and the purchase distribution
//! validator. It is used by the backend and, via WASM, by the browser.

pub mod distribution;
pub mod models;
pub mod types;
pub mod validation;
pub mod wac;

pub use distribution::*;
pub use models::*;
pub use types::*;
pub use validation::*;
pub use wac::*;
