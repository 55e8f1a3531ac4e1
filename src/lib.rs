mod batch;
mod due;
mod error;
mod progress;
mod review;
mod scheduler;
mod sm2;
mod stats;
mod store;
#[cfg(test)]
mod test_helpers;

pub use batch::{BatchOutcome, BatchSummary, DEFAULT_CONCURRENCY_LIMIT, MAX_BATCH_SIZE};
pub use due::{CATALOG_BATCH_SIZE, DueItem, DueItemsPage};
pub use error::{Result, SchedulerError, StoreError};
pub use progress::{CatalogEntry, MasteryLevel, ProgressRecord, ReviewRequest};
pub use scheduler::Scheduler;
pub use sm2::{INITIAL_EASE_FACTOR, MIN_EASE_FACTOR, Quality, Sm2Outcome, next_state};
pub use stats::ProgressStats;
pub use store::{CatalogStore, ProgressStore};
