use serde::{Deserialize, Serialize};

use super::{CategoryId, ProductId};

/// Catalog entry as seen by the recommendation core
///
/// Counters are maintained by the order and catalog collaborators; this
/// service only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category_id: CategoryId,
    pub active: bool,
    #[serde(default)]
    pub purchase_count: u64,
    #[serde(default)]
    pub view_count: u64,
}

impl Product {
    /// Creates an active product with zeroed counters
    pub fn new(id: ProductId, name: impl Into<String>, category_id: CategoryId) -> Self {
        Self {
            id,
            name: name.into(),
            category_id,
            active: true,
            purchase_count: 0,
            view_count: 0,
        }
    }

    pub fn with_counts(mut self, purchase_count: u64, view_count: u64) -> Self {
        self.purchase_count = purchase_count;
        self.view_count = view_count;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}
