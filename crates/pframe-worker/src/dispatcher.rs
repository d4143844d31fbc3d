//! Job dispatcher.
//!
//! Accepts submissions, persists a `queued` record for each and hands the
//! job to a scheduler that runs at most `max_concurrent_jobs` executions at
//! a time. Submissions never wait on processing: the caller gets the job id
//! back as soon as the record exists.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pframe_models::{JobId, JobKind, JobParams, JobRecord, SubmitResponse};
use pframe_store::JobStore;

use crate::config::WorkerConfig;
use crate::engine::ProcessingEngine;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::{JobExecutor, JobTask};
use crate::metrics;
use crate::upload::{InputRef, UploadSource};

/// Attempts at finding an unused job id before giving up.
const MAX_ID_ATTEMPTS: u32 = 3;

type Registry = Arc<Mutex<HashSet<JobId>>>;

/// Front door of the job system.
///
/// Must be started inside a Tokio runtime; the scheduler runs as a spawned
/// task until [`shutdown`](Dispatcher::shutdown).
pub struct Dispatcher {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    engine: Arc<dyn ProcessingEngine>,
    queue: mpsc::Sender<JobTask>,
    slots: Arc<Semaphore>,
    in_flight: Registry,
    shutdown: watch::Sender<bool>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Create the dispatcher and spawn its scheduler.
    pub fn start(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        engine: Arc<dyn ProcessingEngine>,
        uploads: Arc<dyn UploadSource>,
    ) -> Self {
        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        let slots = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let in_flight: Registry = Arc::new(Mutex::new(HashSet::new()));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let executor = Arc::new(JobExecutor::new(
            Arc::clone(&store),
            Arc::clone(&engine),
            uploads,
            config.job_timeout,
        ));

        info!(
            max_concurrent_jobs = config.max_concurrent_jobs,
            queue_capacity = config.queue_capacity,
            job_timeout_secs = config.job_timeout.as_secs(),
            "Starting job dispatcher"
        );

        let scheduler = tokio::spawn(schedule(
            rx,
            Arc::clone(&slots),
            executor,
            Arc::clone(&in_flight),
            shutdown_rx,
        ));

        Self {
            config,
            store,
            engine,
            queue,
            slots,
            in_flight,
            shutdown,
            scheduler: Mutex::new(Some(scheduler)),
        }
    }

    /// Accept a job and schedule it for background execution.
    ///
    /// On success the dispatcher owns `input` and releases it when the job
    /// ends. On error no record was created and the caller still owns it.
    pub async fn submit(
        &self,
        kind: JobKind,
        input: InputRef,
        params: JobParams,
    ) -> WorkerResult<SubmitResponse> {
        if params.kind() != kind {
            metrics::record_job_rejected("invalid_params");
            return Err(WorkerError::validation(format!(
                "{} parameters supplied for a {} job",
                params.kind(),
                kind
            )));
        }
        if let Err(e) = params.validate() {
            metrics::record_job_rejected("invalid_params");
            return Err(WorkerError::validation(e.to_string()));
        }
        if self.is_shutting_down() {
            metrics::record_job_rejected("shutting_down");
            return Err(WorkerError::ShuttingDown);
        }

        // Claim a queue slot before anything is persisted.
        let permit = match self.queue.try_reserve() {
            Ok(permit) => permit,
            Err(TrySendError::Full(())) => {
                metrics::record_job_rejected("at_capacity");
                warn!(limit = self.config.queue_capacity, "Rejecting submission, queue full");
                return Err(WorkerError::AtCapacity {
                    limit: self.config.queue_capacity,
                });
            }
            Err(TrySendError::Closed(())) => {
                metrics::record_job_rejected("shutting_down");
                return Err(WorkerError::ShuttingDown);
            }
        };

        let record = self.create_record(kind).await?;
        let response = SubmitResponse {
            job_id: record.id.clone(),
            status: record.status,
        };

        info!(job_id = %record.id, kind = %kind, input = %input.original_name, "Job submitted");
        metrics::record_job_submitted(kind);
        permit.send(JobTask { record, input, params });

        Ok(response)
    }

    /// Persist a fresh `queued` record under an unused id.
    async fn create_record(&self, kind: JobKind) -> WorkerResult<JobRecord> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let record = JobRecord::new(JobId::new(), kind, Utc::now());

            match self.store.create(&record, self.config.job_ttl).await {
                Ok(true) => return Ok(record),
                Ok(false) => {
                    warn!(job_id = %record.id, attempt, "Job id already in use, regenerating");
                }
                Err(e) => {
                    metrics::record_job_rejected("store_unavailable");
                    return Err(e.into());
                }
            }
        }

        metrics::record_job_rejected("id_exhausted");
        Err(WorkerError::IdExhausted(MAX_ID_ATTEMPTS))
    }

    /// Current record for `job_id`; `None` when unknown or expired.
    pub async fn poll(&self, job_id: &JobId) -> WorkerResult<Option<JobRecord>> {
        Ok(self.store.get(job_id).await?)
    }

    pub fn engine(&self) -> &Arc<dyn ProcessingEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Executions currently holding a slot.
    pub fn active_jobs(&self) -> usize {
        self.config
            .max_concurrent_jobs
            .max(1)
            .saturating_sub(self.slots.available_permits())
    }

    /// Accepted jobs still waiting for a slot.
    pub fn pending_jobs(&self) -> usize {
        self.queue.max_capacity().saturating_sub(self.queue.capacity())
    }

    /// Whether `job_id` is being executed right now.
    pub async fn is_executing(&self, job_id: &JobId) -> bool {
        self.in_flight.lock().await.contains(job_id)
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stop accepting work and wait for running jobs.
    ///
    /// Jobs still waiting for a slot are failed. Running jobs get up to
    /// `shutdown_timeout` to finish. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.shutdown.send_replace(true) {
            debug!("Dispatcher already shutting down");
        } else {
            info!("Shutting down job dispatcher");
        }

        if let Some(scheduler) = self.scheduler.lock().await.take() {
            if let Err(e) = scheduler.await {
                warn!("Scheduler task ended abnormally: {}", e);
            }
        }

        let drained = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs()).await;
        match drained {
            Ok(()) => info!("All running jobs finished"),
            Err(_) => warn!(
                still_running = self.active_jobs(),
                "Shutdown timeout reached with jobs still running"
            ),
        }
    }

    async fn wait_for_jobs(&self) {
        while self.active_jobs() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Scheduler loop: pair each queued task with a free slot and spawn it.
async fn schedule(
    mut rx: mpsc::Receiver<JobTask>,
    slots: Arc<Semaphore>,
    executor: Arc<JobExecutor>,
    in_flight: Registry,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let slot = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            slot = Arc::clone(&slots).acquire_owned() => match slot {
                Ok(slot) => slot,
                Err(_) => break,
            },
        };

        let task = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        let job_id = task.record.id.clone();
        let duplicate = {
            let mut registry = in_flight.lock().await;
            let inserted = registry.insert(job_id.clone());
            metrics::set_active_jobs(registry.len());
            !inserted
        };
        if duplicate {
            warn!(job_id = %job_id, "Job is already executing, dropping duplicate");
            executor.discard(task).await;
            continue;
        }

        let executor = Arc::clone(&executor);
        let in_flight = Arc::clone(&in_flight);
        tokio::spawn(async move {
            let _slot = slot;
            executor.execute(task).await;

            let mut registry = in_flight.lock().await;
            registry.remove(&job_id);
            metrics::set_active_jobs(registry.len());
        });
    }

    // Fail whatever never got a slot so it does not sit in `queued` until expiry.
    rx.close();
    let mut abandoned = 0usize;
    while let Some(task) = rx.recv().await {
        executor.abandon(task, "Service shutting down").await;
        abandoned += 1;
    }
    if abandoned > 0 {
        info!(abandoned, "Failed queued jobs on shutdown");
    }
    debug!("Scheduler stopped");
}
