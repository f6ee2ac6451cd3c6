//! Category storage trait.

use crate::StoreError;
use ballot_types::{CategoryId, Timestamp};
use serde::{Deserialize, Serialize};

/// A stored category (one poll question).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub is_open: bool,
    pub created_at: Timestamp,
    /// Identity of the administrator who created the category, if known.
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Input for [`CategoryStore::create_category`]. Categories start closed.
#[derive(Clone, Debug)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub created_by: Option<String>,
}

/// Trait for category storage operations.
pub trait CategoryStore {
    /// Allocate an id and persist a new, closed category.
    ///
    /// Fails with [`StoreError::Duplicate`] if the name is already taken.
    fn create_category(
        &self,
        category: &NewCategory,
        now: Timestamp,
    ) -> Result<CategoryInfo, StoreError>;

    fn get_category(&self, id: CategoryId) -> Result<Option<CategoryInfo>, StoreError>;

    /// Open or close voting. Returns the updated record.
    fn set_open(&self, id: CategoryId, open: bool) -> Result<CategoryInfo, StoreError>;

    /// Permanently remove a closed category together with its candidates and
    /// participation records. Returns the number of candidates removed.
    ///
    /// Fails with [`StoreError::Conflict`] if the category is open.
    fn delete_category(&self, id: CategoryId) -> Result<usize, StoreError>;

    /// All categories in id (creation) order.
    fn iter_categories(&self) -> Result<Vec<CategoryInfo>, StoreError>;
}
