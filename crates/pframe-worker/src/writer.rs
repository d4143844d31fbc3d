//! Single-writer access to one job's record.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use pframe_models::{transition, JobEvent, JobId, JobRecord, TransitionError};
use pframe_store::{JobStore, Revision, StoreError, SwapOutcome};

use crate::engine::ProgressSink;
use crate::retry::{retry_async, RetryConfig};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("transition rejected: {0}")]
    Rejected(#[from] TransitionError),

    #[error("job record is missing or expired")]
    Missing,

    #[error("job record was changed by another writer")]
    Conflict,

    #[error("job store error: {0}")]
    Store(#[from] StoreError),
}

/// The only component that mutates a given job's stored record.
///
/// Holds the last record it wrote and applies each event with a
/// compare-and-swap against that snapshot, so an update can never silently
/// overwrite a concurrent one.
pub struct JobWriter {
    store: Arc<dyn JobStore>,
    current: Mutex<JobRecord>,
    retry: RetryConfig,
}

impl JobWriter {
    /// Start writing from `record`, which must be what the store currently holds.
    pub fn new(store: Arc<dyn JobStore>, record: JobRecord) -> Self {
        Self {
            store,
            current: Mutex::new(record),
            retry: RetryConfig::new("job record write"),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Last record written (or the starting record).
    pub async fn snapshot(&self) -> JobRecord {
        self.current.lock().await.clone()
    }

    pub async fn job_id(&self) -> JobId {
        self.current.lock().await.id.clone()
    }

    /// Apply `event` and persist the result.
    ///
    /// A rejected transition leaves both the snapshot and the store untouched.
    pub async fn apply(&self, event: JobEvent) -> Result<JobRecord, WriteError> {
        let mut current = self.current.lock().await;
        let next = transition(&current, event, Utc::now())?;

        let outcome = retry_async(&self.retry, StoreError::is_transient, || {
            self.store.compare_and_swap(&current, &next)
        })
        .await?;

        match outcome {
            SwapOutcome::Swapped => {}
            SwapOutcome::Missing => return Err(WriteError::Missing),
            SwapOutcome::Conflict => {
                // A retried swap may have landed before its reply was lost.
                let stored = self.store.get(&next.id).await?;
                match stored {
                    Some(stored) if Revision::of(&stored) == Revision::of(&next) => {
                        debug!(job_id = %next.id, "Swap had already been applied");
                    }
                    Some(_) => return Err(WriteError::Conflict),
                    None => return Err(WriteError::Missing),
                }
            }
        }

        *current = next.clone();
        Ok(next)
    }
}

#[async_trait]
impl ProgressSink for JobWriter {
    async fn report(&self, percent: u8) {
        match self.apply(JobEvent::Progress(percent)).await {
            Ok(record) => debug!(job_id = %record.id, progress = percent, "Progress recorded"),
            Err(WriteError::Rejected(e)) => {
                debug!(progress = percent, "Ignoring progress update: {}", e);
            }
            Err(e) => warn!(progress = percent, "Failed to record progress: {}", e),
        }
    }
}
