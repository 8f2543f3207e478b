//! Catalog entries and store-wide settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: String,
    /// Units available; only maintained while cart holds are active.
    pub stock: i64,
    pub preorder: bool,
}

/// Store settings read once per webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    /// Stock is reserved at checkout and settled on payment or expiry.
    pub cart_hold_active: bool,
    /// Length in days of a trial order.
    pub trial_days: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            cart_hold_active: false,
            trial_days: 1,
        }
    }
}
