//! Processing engine interface.
//!
//! The engine does the actual watermark work. It is constructed once at
//! start-up and shared by handle; its readiness is a queryable capability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use pframe_models::{JobKind, JobParams};

use crate::upload::InputRef;

pub type EngineResult<T> = Result<T, EngineFailure>;

/// A failure reported by (or on behalf of) the processing engine.
///
/// The display string is what ends up in the job's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineFailure {
    #[error("{0}")]
    Failed(String),

    #[error("Models not loaded")]
    NotReady,
}

impl EngineFailure {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Receives intermediate progress from a running engine.
///
/// Reporting is best-effort: implementations swallow and log their own
/// errors, so an engine never fails because progress could not be stored.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, percent: u8);
}

/// Progress sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn report(&self, _percent: u8) {}
}

/// Executes embed/detect work.
#[async_trait]
pub trait ProcessingEngine: Send + Sync {
    /// Whether models are loaded and jobs can run.
    fn is_ready(&self) -> bool;

    /// Names of the models this engine serves.
    fn available_models(&self) -> Vec<String>;

    /// When the models were last (re)loaded, if known.
    fn last_updated(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Reload models.
    async fn reload(&self) -> EngineResult<()>;

    /// Run one job to completion and return its result payload.
    async fn run(
        &self,
        kind: JobKind,
        input: &InputRef,
        params: &JobParams,
        progress: &dyn ProgressSink,
    ) -> EngineResult<serde_json::Value>;
}
