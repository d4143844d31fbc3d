//! In-process job store.
//!
//! Expiry is measured with `tokio::time::Instant`, so tests can pause and
//! advance the runtime clock to move past a record's TTL.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use pframe_models::{JobId, JobRecord};

use crate::error::StoreResult;
use crate::store::{JobStore, Revision, SwapOutcome};

struct Entry {
    record: JobRecord,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Job store held in process memory behind a single lock.
///
/// ```
/// # tokio_test::block_on(async {
/// use std::time::Duration;
///
/// use chrono::Utc;
/// use pframe_models::{JobId, JobKind, JobRecord};
/// use pframe_store::{JobStore, MemoryJobStore};
///
/// let store = MemoryJobStore::new();
/// let record = JobRecord::new(JobId::new(), JobKind::Embed, Utc::now());
///
/// assert!(store.create(&record, Duration::from_secs(3600)).await.unwrap());
/// assert_eq!(store.get(&record.id).await.unwrap(), Some(record));
/// # });
/// ```
#[derive(Default)]
pub struct MemoryJobStore {
    entries: Mutex<HashMap<JobId, Entry>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, Instant::now())
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn evict_expired(entries: &mut HashMap<JobId, Entry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.is_live(now));
    let removed = before - entries.len();
    if removed > 0 {
        debug!("Purged {} expired job records", removed);
    }
    removed
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, record: &JobRecord, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        // Records nobody polls again are only reclaimed here.
        evict_expired(&mut entries, now);

        if entries.contains_key(&record.id) {
            return Ok(false);
        }

        entries.insert(
            record.id.clone(),
            Entry {
                record: record.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match entries.get(id) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.record.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        entries.remove(id);
        Ok(None)
    }

    async fn compare_and_swap(&self, current: &JobRecord, next: &JobRecord) -> StoreResult<SwapOutcome> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries.get_mut(&current.id) else {
            return Ok(SwapOutcome::Missing);
        };
        if !entry.is_live(now) {
            entries.remove(&current.id);
            return Ok(SwapOutcome::Missing);
        }
        if Revision::of(&entry.record) != Revision::of(current) {
            return Ok(SwapOutcome::Conflict);
        }

        // Expiry stays where `create` put it.
        entry.record = next.clone();
        Ok(SwapOutcome::Swapped)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
