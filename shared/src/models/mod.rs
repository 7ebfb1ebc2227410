//! Domain models for the Retail Inventory platform

mod inventory;
mod invoice;
mod product;
mod shop;
mod transfer;

pub use inventory::*;
pub use invoice::*;
pub use product::*;
pub use shop::*;
pub use transfer::*;
