pub mod account;
pub mod category;
pub mod inventory;
pub mod location;
pub mod product;
pub mod supplier;

pub use account::*;
pub use category::*;
pub use inventory::*;
pub use location::*;
pub use product::*;
pub use supplier::*;

use serde::{Deserialize, Serialize};

/// Limit/offset window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}
