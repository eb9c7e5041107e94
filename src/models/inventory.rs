use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Location, ProductSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: i64,
    pub product: ProductSummary,
    pub location: Location,
    pub quantity: i32,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewInventory {
    pub product_id: i64,
    pub location_id: i64,
    pub quantity: i32,
}

/// Sparse inventory update. `Some(0)` for quantity is a real value, not "unset".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryPatch {
    pub product_id: Option<i64>,
    pub location_id: Option<i64>,
    pub quantity: Option<i32>,
}

impl InventoryPatch {
    pub fn is_empty(&self) -> bool {
        self.product_id.is_none() && self.location_id.is_none() && self.quantity.is_none()
    }
}
