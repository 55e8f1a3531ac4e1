use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::sm2::{self, Quality, Sm2Outcome};

/// Per-(user, item) scheduling state. Created lazily on first review and
/// mutated only through the SM-2 transition; deleted only by an explicit
/// reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub item_id: String,
    pub ease_factor: f64,
    /// Days until the next review.
    pub interval: u32,
    /// Consecutive successful reviews since the last failure or reset.
    pub repetitions: u32,
    pub next_review_date: DateTime<Utc>,
    pub last_quality: Option<u8>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub first_learned_at: DateTime<Utc>,
    pub total_reviews: u32,
    pub correct_count: u32,
}

impl ProgressRecord {
    pub fn new(user_id: &str, item_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_owned(),
            item_id: item_id.to_owned(),
            ease_factor: sm2::INITIAL_EASE_FACTOR,
            interval: 0,
            repetitions: 0,
            next_review_date: now,
            last_quality: None,
            last_reviewed_at: None,
            first_learned_at: now,
            total_reviews: 0,
            correct_count: 0,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date <= now
    }

    /// The record after grading one review at `now`.
    pub(crate) fn reviewed(&self, quality: Quality, now: DateTime<Utc>) -> Self {
        let Sm2Outcome {
            ease_factor,
            interval,
            repetitions,
            next_review_date,
        } = sm2::next_state(quality, self.ease_factor, self.interval, self.repetitions, now);
        Self {
            ease_factor,
            interval,
            repetitions,
            next_review_date,
            last_quality: Some(quality.value()),
            last_reviewed_at: Some(now),
            total_reviews: self.total_reviews + 1,
            correct_count: self.correct_count + u32::from(quality.is_correct()),
            ..self.clone()
        }
    }

    pub fn mastery(&self) -> MasteryLevel {
        match self.interval {
            0 => MasteryLevel::New,
            1..21 => MasteryLevel::Learning,
            21..60 => MasteryLevel::Reviewing,
            _ => MasteryLevel::Mastered,
        }
    }
}

/// Mastery buckets by current interval: exhaustive and mutually exclusive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    New,
    Learning,
    Reviewing,
    Mastered,
}

/// Catalog metadata for one vocabulary item, owned by the catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item_id: String,
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

/// One graded review as submitted by a client. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub item_id: String,
    pub quality: u8,
}
