//! Shop models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ShopId;

/// A physical shop location that partitions inventory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    /// Receives purchase stock when an invoice line carries no distribution
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Resolve the shop that receives undistributed purchase stock.
///
/// The shop flagged as default wins when exactly one is flagged; a single
/// configured shop is implicitly the default.
pub fn default_shop(shops: &[Shop]) -> Option<&Shop> {
    let mut flagged = shops.iter().filter(|s| s.is_default);
    match (flagged.next(), flagged.next()) {
        (Some(shop), None) => Some(shop),
        (Some(_), Some(_)) => None,
        (None, _) if shops.len() == 1 => shops.first(),
        (None, _) => None,
    }
}
