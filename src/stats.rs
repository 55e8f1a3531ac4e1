use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use snafu::ResultExt;
use strum::IntoEnumIterator;

use crate::due::CATALOG_BATCH_SIZE;
use crate::error::{Result, StorageSnafu};
use crate::progress::{MasteryLevel, ProgressRecord};
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Serialize)]
pub struct ProgressStats {
    pub total_items: usize,
    pub due_today: usize,
    /// Count per mastery bucket; every bucket is present, zero-filled.
    pub mastery_breakdown: BTreeMap<MasteryLevel, usize>,
    /// Mean ease factor, rounded to 2 decimals. 0 when the user has no items.
    pub average_ease_factor: f64,
    pub total_reviews: u64,
    /// Percentage of correct reviews, rounded to the nearest integer.
    pub accuracy_rate: u32,
}

impl Scheduler {
    /// Reduce a user's full progress set to its summary statistics,
    /// optionally restricted to one catalog category.
    pub async fn stats(
        &self,
        user_id: &str,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ProgressStats> {
        let mut records = self.progress.query_all(user_id).await.context(StorageSnafu)?;
        if let Some(category) = category {
            records = self.in_category(records, category).await?;
        }

        let total_items = records.len();
        let due_today = records.iter().filter(|r| r.is_due(now)).count();

        let mut counts = records.iter().map(|r| r.mastery()).counts();
        let mastery_breakdown = MasteryLevel::iter()
            .map(|level| (level, counts.remove(&level).unwrap_or(0)))
            .collect();

        let average_ease_factor = if total_items == 0 {
            0.0
        } else {
            let mean = records.iter().map(|r| r.ease_factor).sum::<f64>() / total_items as f64;
            (mean * 100.0).round() / 100.0
        };

        let total_reviews: u64 = records.iter().map(|r| u64::from(r.total_reviews)).sum();
        let correct: u64 = records.iter().map(|r| u64::from(r.correct_count)).sum();
        let accuracy_rate = if total_reviews == 0 {
            0
        } else {
            (100.0 * correct as f64 / total_reviews as f64).round() as u32
        };

        Ok(ProgressStats {
            total_items,
            due_today,
            mastery_breakdown,
            average_ease_factor,
            total_reviews,
            accuracy_rate,
        })
    }

    /// Same join as the due-item query, but uncapped: every record is
    /// checked against the catalog, in bounded lookup batches.
    async fn in_category(
        &self,
        records: Vec<ProgressRecord>,
        category: &str,
    ) -> Result<Vec<ProgressRecord>> {
        let mut kept = Vec::new();
        for chunk in records.chunks(CATALOG_BATCH_SIZE) {
            let ids: Vec<String> = chunk.iter().map(|r| r.item_id.clone()).collect();
            let metadata = self.catalog.get_by_ids(&ids).await.context(StorageSnafu)?;
            kept.extend(
                chunk
                    .iter()
                    .filter(|record| {
                        metadata
                            .get(&record.item_id)
                            .is_some_and(|entry| entry.category.as_deref() == Some(category))
                    })
                    .cloned(),
            );
        }
        Ok(kept)
    }
}
