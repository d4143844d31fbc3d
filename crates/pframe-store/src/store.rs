//! The job store contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use pframe_models::{JobId, JobRecord, JobStatus};

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreResult;
use crate::memory::MemoryJobStore;
use crate::redis_store::RedisJobStore;

/// Outcome of a compare-and-swap update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The stored record matched and was replaced.
    Swapped,
    /// The stored record changed since it was read; nothing was written.
    Conflict,
    /// No record exists (never created, or its TTL elapsed).
    Missing,
}

/// The fields that identify one version of a record.
///
/// Every transition bumps `updated_at` or changes `status`/`progress`, so two
/// records with the same revision are the same version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub status: JobStatus,
    pub progress: u8,
    pub updated_at: DateTime<Utc>,
}

impl Revision {
    pub fn of(record: &JobRecord) -> Self {
        Self {
            status: record.status,
            progress: record.progress,
            updated_at: record.updated_at,
        }
    }
}

/// Shared, TTL-bound map from job id to job record.
///
/// Lifetimes are fixed from creation: updates keep the expiry set by
/// `create`, so repeated writes can never keep a job alive indefinitely.
/// Unknown and expired ids are indistinguishable (`None` / `Missing`).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record that expires `ttl` after now.
    ///
    /// Returns `false` without writing if the id is already taken.
    async fn create(&self, record: &JobRecord, ttl: Duration) -> StoreResult<bool>;

    /// Fetch a record.
    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>>;

    /// Atomically replace `current` with `next` if the stored record is still
    /// at `current`'s revision.
    async fn compare_and_swap(&self, current: &JobRecord, next: &JobRecord) -> StoreResult<SwapOutcome>;

    /// Check connectivity.
    async fn ping(&self) -> StoreResult<()>;
}

/// Build the configured store.
pub fn connect(config: &StoreConfig) -> StoreResult<Arc<dyn JobStore>> {
    match config.backend {
        StoreBackend::Redis => {
            info!(key_prefix = %config.key_prefix, "Using Redis job store");
            Ok(Arc::new(RedisJobStore::new(config)?))
        }
        StoreBackend::Memory => {
            info!("Using in-memory job store");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}
