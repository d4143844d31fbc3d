//! Worker error types.
//!
//! These are the errors surfaced synchronously to a submitting or polling
//! caller. Failures inside a background execution never show up here; they
//! end up in the job record's `error` field instead.

use thiserror::Error;

use pframe_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Too many jobs in flight (limit {limit})")]
    AtCapacity { limit: usize },

    #[error("Dispatcher is shutting down")]
    ShuttingDown,

    #[error("Could not allocate a unique job id after {0} attempts")]
    IdExhausted(u32),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if the caller could reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::StoreUnavailable(_) | WorkerError::AtCapacity { .. } | WorkerError::IdExhausted(_)
        )
    }
}
