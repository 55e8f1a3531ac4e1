use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::progress::{CatalogEntry, ProgressRecord};

/// Durable storage for per-(user, item) progress records. Implementations
/// wrap a key-value backend with conditional-write and scan capability; the
/// engine never assumes anything beyond this contract.
///
/// Every write is scoped to a single (user_id, item_id) key, so the only
/// races that matter are same-key ones, and `conditional_update` is the
/// engine's sole consistency backstop for those.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get(&self, user_id: &str, item_id: &str)
    -> Result<Option<ProgressRecord>, StoreError>;

    /// Unconditional upsert, used to persist a freshly initialized record.
    async fn put(&self, record: &ProgressRecord) -> Result<(), StoreError>;

    /// Write `record` only if a record for its key currently exists.
    /// Returns the persisted record, or `StoreError::PreconditionFailed`
    /// when the key is absent (e.g. deleted concurrently).
    async fn conditional_update(&self, record: &ProgressRecord)
    -> Result<ProgressRecord, StoreError>;

    async fn delete(&self, user_id: &str, item_id: &str) -> Result<(), StoreError>;

    /// All records for `user_id` with `next_review_date <= now`, most overdue
    /// first (ties broken by earlier `next_review_date`). Backends may page
    /// internally; callers see one ordered list.
    async fn query_due(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProgressRecord>, StoreError>;

    /// Every record for `user_id`, in no particular order.
    async fn query_all(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError>;
}

/// Read-only view of the vocabulary catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Batched metadata lookup. Ids with no catalog entry are simply absent
    /// from the returned map.
    async fn get_by_ids(&self, ids: &[String])
    -> Result<HashMap<String, CatalogEntry>, StoreError>;
}
