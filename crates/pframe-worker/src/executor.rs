//! Background execution of a single job.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::Instrument;

use pframe_models::{JobEvent, JobParams, JobRecord, JobStatus};
use pframe_store::JobStore;

use crate::cleanup::ArtifactGuard;
use crate::engine::ProcessingEngine;
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};
use crate::upload::{InputRef, UploadSource};
use crate::writer::{JobWriter, WriteError};

/// A persisted, queued job waiting for an execution slot.
#[derive(Debug, Clone)]
pub struct JobTask {
    /// Record exactly as it was created in the store
    pub record: JobRecord,
    pub input: InputRef,
    pub params: JobParams,
}

/// Drives one job from `queued` to a terminal status.
///
/// Every failure inside the execution, including a panic or a timeout in the
/// engine, is turned into a `failed` record. The input artifact is released
/// on every path.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    engine: Arc<dyn ProcessingEngine>,
    uploads: Arc<dyn UploadSource>,
    job_timeout: Duration,
    store_retry: RetryConfig,
}

impl JobExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        engine: Arc<dyn ProcessingEngine>,
        uploads: Arc<dyn UploadSource>,
        job_timeout: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            uploads,
            job_timeout,
            store_retry: RetryConfig::new("job record write"),
        }
    }

    /// Backoff used for every record write, and again around a failed start.
    pub fn with_store_retry(mut self, retry: RetryConfig) -> Self {
        self.store_retry = retry;
        self
    }

    fn writer(&self, record: JobRecord) -> JobWriter {
        JobWriter::new(Arc::clone(&self.store), record).with_retry(self.store_retry.clone())
    }

    /// Execute `task` and return the final record, if one could be written.
    pub async fn execute(&self, task: JobTask) -> Option<JobRecord> {
        let logger = JobLogger::new(&task.record.id, task.record.kind);
        let span = logger.create_span();
        self.execute_inner(task, logger).instrument(span).await
    }

    async fn execute_inner(&self, task: JobTask, logger: JobLogger) -> Option<JobRecord> {
        let JobTask { record, input, params } = task;
        let kind = record.kind;
        let guard = ArtifactGuard::new(record.id.clone(), Arc::clone(&self.uploads), input);
        let writer = self.writer(record);
        let started = Instant::now();

        match writer.apply(JobEvent::Start).await {
            Ok(_) => logger.log_start(&format!("input {}", guard.input().original_name)),
            Err(WriteError::Store(e)) => {
                logger.log_error(&format!("Could not mark job running: {}", e));
                let reason = format!("Job store unavailable: {}", e);
                let record = self.fail_queued(&writer, &logger, reason).await;
                guard.release().await;
                return record;
            }
            Err(e) => {
                // Expired, or another execution owns this job.
                logger.log_warning(&format!("Not starting job: {}", e));
                guard.release().await;
                return None;
            }
        }

        let event = self.run_engine(&writer, &guard, &params, &logger).await;
        let succeeded = matches!(event, JobEvent::Succeed(_));
        let record = self.settle(&writer, &logger, event).await;

        guard.release().await;

        let elapsed = started.elapsed().as_secs_f64();
        if succeeded {
            metrics::record_job_completed(kind, elapsed);
        } else {
            metrics::record_job_failed(kind, elapsed);
        }
        record
    }

    /// Run the engine and translate whatever happens into a terminal event.
    async fn run_engine(
        &self,
        writer: &JobWriter,
        guard: &ArtifactGuard,
        params: &JobParams,
        logger: &JobLogger,
    ) -> JobEvent {
        if !self.engine.is_ready() {
            return JobEvent::Fail("Models not loaded".to_string());
        }
        if !self.uploads.exists(guard.input()).await {
            return JobEvent::Fail(format!(
                "Input file not found: {}",
                guard.input().original_name
            ));
        }

        let run = self
            .engine
            .run(logger.kind(), guard.input(), params, writer);
        let outcome = tokio::time::timeout(self.job_timeout, AssertUnwindSafe(run).catch_unwind()).await;

        match outcome {
            Ok(Ok(Ok(result))) => JobEvent::Succeed(result),
            Ok(Ok(Err(failure))) => JobEvent::Fail(failure.to_string()),
            Ok(Err(panic)) => {
                let message = panic_message(&*panic);
                logger.log_error(&format!("Engine panicked: {}", message));
                JobEvent::Fail(format!("Processing panicked: {}", message))
            }
            Err(_) => JobEvent::Fail(format!(
                "Processing timed out after {}s",
                self.job_timeout.as_secs()
            )),
        }
    }

    /// Apply a terminal event, logging the outcome.
    async fn settle(&self, writer: &JobWriter, logger: &JobLogger, event: JobEvent) -> Option<JobRecord> {
        match writer.apply(event).await {
            Ok(record) => {
                match record.status {
                    JobStatus::Completed => logger.log_completion("result stored"),
                    _ => logger.log_error(record.error.as_deref().unwrap_or("unknown error")),
                }
                Some(record)
            }
            Err(e) => {
                logger.log_error(&format!("Could not record final status: {}", e));
                None
            }
        }
    }

    /// Move a job that never left `queued` to `failed`.
    ///
    /// `Fail` is only accepted from `running`, so the job is started first.
    /// The start is retried on store errors so an outage that outlasts a
    /// single write does not strand the record.
    async fn fail_queued(&self, writer: &JobWriter, logger: &JobLogger, reason: String) -> Option<JobRecord> {
        let started = retry_async(
            &self.store_retry,
            |e: &WriteError| matches!(e, WriteError::Store(_)),
            || writer.apply(JobEvent::Start),
        )
        .await;

        match started {
            Ok(_) => self.settle(writer, logger, JobEvent::Fail(reason)).await,
            Err(e) => {
                logger.log_warning(&format!("Could not fail queued job: {}", e));
                None
            }
        }
    }

    /// Release a task's input without touching its record.
    ///
    /// For a task whose job is owned by another execution.
    pub async fn discard(&self, task: JobTask) {
        ArtifactGuard::new(task.record.id, Arc::clone(&self.uploads), task.input)
            .release()
            .await;
    }

    /// Fail a job that will never get an execution slot.
    ///
    /// The input is released either way. A job some other execution already
    /// started is left alone.
    pub async fn abandon(&self, task: JobTask, reason: &str) -> Option<JobRecord> {
        let logger = JobLogger::new(&task.record.id, task.record.kind);
        let guard = ArtifactGuard::new(task.record.id.clone(), Arc::clone(&self.uploads), task.input);
        let writer = self.writer(task.record);

        let record = self.fail_queued(&writer, &logger, reason.to_string()).await;
        guard.release().await;
        record
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
