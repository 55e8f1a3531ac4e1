use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use snafu::ResultExt;

use crate::error::{Result, StorageSnafu};
use crate::progress::{CatalogEntry, ProgressRecord};
use crate::scheduler::Scheduler;

/// How many catalog metadata lookups go out per request when joining due
/// records against the catalog.
pub const CATALOG_BATCH_SIZE: usize = 50;

/// A due progress record joined with its catalog metadata. The metadata can
/// be absent when the catalog entry was removed after the item was learned;
/// category-filtered queries always carry it.
#[derive(Debug, Clone, Serialize)]
pub struct DueItem {
    pub progress: ProgressRecord,
    pub catalog: Option<CatalogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DueItemsPage {
    pub items: Vec<DueItem>,
    /// Total number of due (and matching, when filtered) items. When
    /// `total_is_estimate` is set the filtered scan stopped at its batch
    /// budget and this is a projection, not an exact count.
    pub total: usize,
    pub total_is_estimate: bool,
}

impl Scheduler {
    /// Up to `limit` items whose next review has come, most overdue first,
    /// optionally restricted to one catalog category.
    pub async fn due_items(
        &self,
        user_id: &str,
        limit: usize,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DueItemsPage> {
        let due = self.progress.query_due(user_id, now).await.context(StorageSnafu)?;

        match category {
            None => self.due_page(due, limit).await,
            Some(category) => self.due_page_filtered(due, limit, category).await,
        }
    }

    async fn due_page(&self, due: Vec<ProgressRecord>, limit: usize) -> Result<DueItemsPage> {
        let total = due.len();
        let head: Vec<ProgressRecord> = due.into_iter().take(limit).collect();
        let ids: Vec<String> = head.iter().map(|r| r.item_id.clone()).collect();
        let mut metadata = self.catalog.get_by_ids(&ids).await.context(StorageSnafu)?;

        let items = head
            .into_iter()
            .map(|progress| {
                let catalog = metadata.remove(&progress.item_id);
                DueItem { progress, catalog }
            })
            .collect();

        Ok(DueItemsPage {
            items,
            total,
            total_is_estimate: false,
        })
    }

    /// Category membership is unknown until the catalog is consulted, so the
    /// due list is joined in bounded batches, in overdue order, stopping at
    /// `limit` matches or at the batch budget. When the budget runs out
    /// before the due list does, the total is projected from the match rate
    /// over the scanned prefix.
    async fn due_page_filtered(
        &self,
        due: Vec<ProgressRecord>,
        limit: usize,
        category: &str,
    ) -> Result<DueItemsPage> {
        let total_due = due.len();
        let batch_budget = (2 * limit).div_ceil(CATALOG_BATCH_SIZE).max(1);

        let mut items: Vec<DueItem> = Vec::new();
        let mut matched = 0usize;
        let mut scanned = 0usize;

        for chunk in due.chunks(CATALOG_BATCH_SIZE).take(batch_budget) {
            if items.len() >= limit {
                break;
            }
            let ids: Vec<String> = chunk.iter().map(|r| r.item_id.clone()).collect();
            let mut metadata = self.catalog.get_by_ids(&ids).await.context(StorageSnafu)?;
            scanned += chunk.len();

            for record in chunk {
                let Some(entry) = metadata.remove(&record.item_id) else {
                    continue;
                };
                if entry.category.as_deref() == Some(category) {
                    matched += 1;
                    if items.len() < limit {
                        items.push(DueItem {
                            progress: record.clone(),
                            catalog: Some(entry),
                        });
                    }
                }
            }
        }

        if scanned == total_due {
            return Ok(DueItemsPage {
                items,
                total: matched,
                total_is_estimate: false,
            });
        }

        // Project the scanned prefix's match rate over the whole due list,
        // never reporting fewer than the matches already seen.
        let projected = (total_due as f64 * matched as f64 / scanned as f64).round() as usize;
        debug!(
            "due scan for category {category} stopped after {scanned}/{total_due}: \
             {matched} matched, projecting {projected}"
        );
        Ok(DueItemsPage {
            items,
            total: projected.max(matched),
            total_is_estimate: true,
        })
    }
}
