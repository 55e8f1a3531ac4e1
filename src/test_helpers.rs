//! In-memory store doubles for the async tests, with knobs to provoke the
//! race and outage paths that a real key-value backend produces.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::error::StoreError;
use crate::progress::{CatalogEntry, ProgressRecord};
use crate::scheduler::Scheduler;
use crate::store::{CatalogStore, ProgressStore};

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub(crate) fn due_record(user_id: &str, item_id: &str, next_review: DateTime<Utc>) -> ProgressRecord {
    ProgressRecord {
        next_review_date: next_review,
        ..ProgressRecord::new(user_id, item_id, t0())
    }
}

pub(crate) fn progress_store() -> Arc<MemoryProgressStore> {
    Arc::new(MemoryProgressStore::default())
}

pub(crate) fn catalog_of(entries: &[(&str, Option<&str>)]) -> Arc<MemoryCatalogStore> {
    Arc::new(MemoryCatalogStore {
        entries: entries
            .iter()
            .map(|(item_id, category)| {
                (
                    (*item_id).to_owned(),
                    CatalogEntry {
                        item_id: (*item_id).to_owned(),
                        category: category.map(str::to_owned),
                        difficulty: None,
                    },
                )
            })
            .collect(),
    })
}

pub(crate) fn scheduler_with(
    progress: Arc<MemoryProgressStore>,
    catalog: Arc<MemoryCatalogStore>,
) -> Scheduler {
    Scheduler::new(progress, catalog)
}

#[derive(Default)]
pub(crate) struct MemoryProgressStore {
    records: Mutex<HashMap<(String, String), ProgressRecord>>,
    /// Items whose operations fail with a backend error.
    broken_items: Mutex<HashSet<String>>,
    /// When set, `query_due`/`query_all` fail with a backend error.
    queries_broken: AtomicBool,
    /// Forces the next N conditional updates to report `PreconditionFailed`
    /// while leaving the record in place (a lost update race).
    pub(crate) fail_conditional: AtomicUsize,
    /// Deletes the record during the next conditional update (a concurrent
    /// delete between read and write).
    pub(crate) vanish_on_conditional: AtomicBool,
    in_flight: AtomicUsize,
    /// High-water mark of concurrently running store calls.
    pub(crate) max_in_flight: AtomicUsize,
}

impl MemoryProgressStore {
    pub(crate) fn seed(&self, record: ProgressRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.user_id.clone(), record.item_id.clone()), record);
    }

    pub(crate) fn break_item(&self, item_id: &str) {
        self.broken_items.lock().unwrap().insert(item_id.to_owned());
    }

    pub(crate) fn break_queries(&self) {
        self.queries_broken.store(true, Ordering::SeqCst);
    }

    fn check_item(&self, item_id: &str) -> Result<(), StoreError> {
        if self.broken_items.lock().unwrap().contains(item_id) {
            return Err(StoreError::Backend {
                message: "simulated outage".to_owned(),
            });
        }
        Ok(())
    }

    /// Tracks overlap of store calls; the sleep keeps each call in flight
    /// long enough for overlap to be observable.
    async fn enter(&self) -> InFlightGuard<'_> {
        let live = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(live, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        InFlightGuard {
            counter: &self.in_flight,
        }
    }
}

struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn get(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        let _guard = self.enter().await;
        self.check_item(item_id)?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(user_id.to_owned(), item_id.to_owned()))
            .cloned())
    }

    async fn put(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        let _guard = self.enter().await;
        self.check_item(&record.item_id)?;
        self.seed(record.clone());
        Ok(())
    }

    async fn conditional_update(
        &self,
        record: &ProgressRecord,
    ) -> Result<ProgressRecord, StoreError> {
        let _guard = self.enter().await;
        self.check_item(&record.item_id)?;
        let key = (record.user_id.clone(), record.item_id.clone());

        if self.vanish_on_conditional.swap(false, Ordering::SeqCst) {
            self.records.lock().unwrap().remove(&key);
            return Err(StoreError::PreconditionFailed);
        }
        if self
            .fail_conditional
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::PreconditionFailed);
        }

        let mut records = self.records.lock().unwrap();
        if !records.contains_key(&key) {
            return Err(StoreError::PreconditionFailed);
        }
        records.insert(key, record.clone());
        Ok(record.clone())
    }

    async fn delete(&self, user_id: &str, item_id: &str) -> Result<(), StoreError> {
        let _guard = self.enter().await;
        self.check_item(item_id)?;
        self.records
            .lock()
            .unwrap()
            .remove(&(user_id.to_owned(), item_id.to_owned()));
        Ok(())
    }

    async fn query_due(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProgressRecord>, StoreError> {
        let _guard = self.enter().await;
        if self.queries_broken.load(Ordering::SeqCst) {
            return Err(StoreError::Backend {
                message: "simulated outage".to_owned(),
            });
        }
        let mut due: Vec<ProgressRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id && r.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.next_review_date);
        Ok(due)
    }

    async fn query_all(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        let _guard = self.enter().await;
        if self.queries_broken.load(Ordering::SeqCst) {
            return Err(StoreError::Backend {
                message: "simulated outage".to_owned(),
            });
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

pub(crate) struct MemoryCatalogStore {
    entries: HashMap<String, CatalogEntry>,
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn get_by_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, CatalogEntry>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| (id.clone(), e.clone())))
            .collect())
    }
}
