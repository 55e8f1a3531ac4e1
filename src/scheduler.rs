use std::sync::Arc;

use snafu::ResultExt;

use crate::error::{Result, StorageSnafu};
use crate::progress::ProgressRecord;
use crate::store::{CatalogStore, ProgressStore};

/// The scheduling engine. Holds its collaborators as explicitly constructed,
/// caller-owned dependencies; cloning is cheap and shares the same stores.
///
/// The review, due-query, batch, and stats operations live in their own
/// modules ([`crate::review`], [`crate::due`], [`crate::batch`],
/// [`crate::stats`]); this module carries construction and the single-record
/// fetch/reset operations.
#[derive(Clone)]
pub struct Scheduler {
    pub(crate) progress: Arc<dyn ProgressStore>,
    pub(crate) catalog: Arc<dyn CatalogStore>,
}

impl Scheduler {
    pub fn new(progress: Arc<dyn ProgressStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { progress, catalog }
    }

    /// The stored progress record for one item, if any.
    pub async fn progress_record(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<Option<ProgressRecord>> {
        self.progress.get(user_id, item_id).await.context(StorageSnafu)
    }

    /// Discard an item's scheduling state. The next review starts the item
    /// over as new; deletion is the only way a record leaves the store.
    pub async fn reset_progress(&self, user_id: &str, item_id: &str) -> Result<()> {
        self.progress.delete(user_id, item_id).await.context(StorageSnafu)
    }
}
