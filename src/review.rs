use chrono::{DateTime, Utc};
use log::warn;
use snafu::{OptionExt, ResultExt};

use crate::error::{ConflictSnafu, NotFoundSnafu, Result, SchedulerError, StorageSnafu, StoreError};
use crate::progress::ProgressRecord;
use crate::scheduler::Scheduler;
use crate::sm2::Quality;

impl Scheduler {
    /// Grade one review and persist the resulting SM-2 state.
    ///
    /// Fails with `Validation` on an out-of-range grade and `NotFound` when
    /// `item_id` is not in the catalog, in both cases before touching the
    /// progress store. A record that does not exist yet is initialized and
    /// then advanced like any other.
    pub async fn record_review(
        &self,
        user_id: &str,
        item_id: &str,
        quality: u8,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord> {
        let quality = Quality::new(quality)?;
        let ids = [item_id.to_owned()];
        let known = self.catalog.get_by_ids(&ids).await.context(StorageSnafu)?;
        snafu::ensure!(known.contains_key(item_id), NotFoundSnafu { item_id });
        self.persist_review(user_id, item_id, quality, now).await
    }

    /// The persistence half of a review, after catalog validation. The batch
    /// processor calls this directly since it validates membership for the
    /// whole batch up front.
    ///
    /// The write is conditional on the record still existing, which detects a
    /// concurrent delete between the read and the write. One recovery pass is
    /// made from a re-fetched record; a second lost race is a `Conflict` the
    /// caller may retry wholesale.
    pub(crate) async fn persist_review(
        &self,
        user_id: &str,
        item_id: &str,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord> {
        let current = match self.progress.get(user_id, item_id).await.context(StorageSnafu)? {
            Some(record) => record,
            None => {
                let initial = ProgressRecord::new(user_id, item_id, now);
                self.progress.put(&initial).await.context(StorageSnafu)?;
                initial
            }
        };

        match self.progress.conditional_update(&current.reviewed(quality, now)).await {
            Ok(persisted) => Ok(persisted),
            Err(StoreError::PreconditionFailed) => {
                warn!("review of {user_id}/{item_id} lost an update race, retrying once");
                self.retry_review(user_id, item_id, quality, now).await
            }
            Err(source) => Err(SchedulerError::Storage { source }),
        }
    }

    async fn retry_review(
        &self,
        user_id: &str,
        item_id: &str,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord> {
        let fresh = self
            .progress
            .get(user_id, item_id)
            .await
            .context(StorageSnafu)?
            .context(NotFoundSnafu { item_id })?;

        match self.progress.conditional_update(&fresh.reviewed(quality, now)).await {
            Ok(persisted) => Ok(persisted),
            Err(StoreError::PreconditionFailed) => ConflictSnafu { item_id }.fail(),
            Err(source) => Err(SchedulerError::Storage { source }),
        }
    }
}
