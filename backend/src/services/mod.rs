//! Business logic services for the Retail Inventory platform

pub mod purchase;
pub mod shop;
pub mod transfer;
pub mod valuation;

pub use purchase::PurchaseService;
pub use shop::ShopService;
pub use transfer::TransferService;
