use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use snafu::ResultExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Result, StorageSnafu, ValidationSnafu};
use crate::progress::ReviewRequest;
use crate::scheduler::Scheduler;
use crate::sm2::Quality;

/// Hard cap on the number of reviews in one batch request.
pub const MAX_BATCH_SIZE: usize = 100;
/// How many reviews may have storage I/O in flight at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;

/// Outcome of one deduplicated review within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub item_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchOutcome>,
}

impl Scheduler {
    /// Apply a batch of graded reviews for one user.
    ///
    /// Duplicate `item_id`s collapse to a single review carrying the last
    /// occurrence's grade. Catalog membership is checked once for the whole
    /// batch; unknown items become failure entries without ever reaching the
    /// progress store. The rest run under a counting semaphore so that at
    /// most `concurrency_limit` reviews do storage I/O simultaneously, and
    /// each item's failure is captured in its own result entry rather than
    /// aborting its siblings.
    ///
    /// The i-th result always corresponds to the i-th deduplicated request
    /// no matter which task finishes first: tasks carry their result index
    /// and write into a pre-sized slot vector.
    ///
    /// Batch application is not atomic: items persisted before a failure
    /// stay persisted.
    pub async fn process_batch(
        &self,
        user_id: &str,
        requests: &[ReviewRequest],
        now: DateTime<Utc>,
        concurrency_limit: usize,
    ) -> Result<BatchSummary> {
        snafu::ensure!(
            requests.len() <= MAX_BATCH_SIZE,
            ValidationSnafu {
                message: format!(
                    "batch of {} reviews exceeds the limit of {MAX_BATCH_SIZE}",
                    requests.len()
                ),
            }
        );

        // Pre-flight: every grade must parse before any storage call, and
        // the last occurrence of a duplicated item wins.
        let mut order: Vec<String> = Vec::with_capacity(requests.len());
        let mut grades: HashMap<String, Quality> = HashMap::with_capacity(requests.len());
        for request in requests {
            let quality = Quality::new(request.quality)?;
            if !grades.contains_key(&request.item_id) {
                order.push(request.item_id.clone());
            }
            grades.insert(request.item_id.clone(), quality);
        }
        debug!(
            "batch for {user_id}: {} requests, {} after dedup",
            requests.len(),
            order.len()
        );

        let known = self.catalog.get_by_ids(&order).await.context(StorageSnafu)?;

        let semaphore = Arc::new(Semaphore::new(concurrency_limit.max(1)));
        let mut slots: Vec<Option<BatchOutcome>> = vec![None; order.len()];
        let mut tasks = JoinSet::new();

        for (index, item_id) in order.iter().enumerate() {
            if !known.contains_key(item_id) {
                // Short-circuit: no permit consumed, no recorder call.
                slots[index] = Some(BatchOutcome {
                    item_id: item_id.clone(),
                    success: false,
                    error: Some(format!("item not found: {item_id}")),
                });
                continue;
            }

            let scheduler = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let user_id = user_id.to_owned();
            let item_id = item_id.clone();
            let quality = grades[&item_id];
            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition cannot fail.
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let outcome = match scheduler.persist_review(&user_id, &item_id, quality, now).await
                {
                    Ok(_) => BatchOutcome {
                        item_id,
                        success: true,
                        error: None,
                    },
                    Err(err) => BatchOutcome {
                        item_id,
                        success: false,
                        error: Some(err.to_string()),
                    },
                };
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, outcome)) = joined {
                slots[index] = Some(outcome);
            }
        }

        // A slot stays empty only if its task panicked or was cancelled.
        let results: Vec<BatchOutcome> = slots
            .into_iter()
            .zip(order)
            .map(|(slot, item_id)| {
                slot.unwrap_or_else(|| BatchOutcome {
                    item_id,
                    success: false,
                    error: Some("review task aborted".to_owned()),
                })
            })
            .collect();

        let successful = results.iter().filter(|r| r.success).count();
        Ok(BatchSummary {
            processed: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        })
    }
}
