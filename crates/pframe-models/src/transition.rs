//! Job lifecycle state machine.
//!
//! `transition` is pure: it never touches the store and never mutates its
//! input. Callers persist the returned record themselves.
//!
//! ```text
//! queued --Start--> running --Progress(p)--> running
//!                   running --Succeed------> completed
//!                   running --Fail---------> failed
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::job::{JobRecord, JobStatus};

/// Minimum progress reported once a job starts running.
pub const START_PROGRESS_FLOOR: u8 = 25;

/// Events that drive a job through its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Start,
    Progress(u8),
    Succeed(serde_json::Value),
    Fail(String),
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Start => "start",
            JobEvent::Progress(_) => "progress",
            JobEvent::Succeed(_) => "succeed",
            JobEvent::Fail(_) => "fail",
        }
    }
}

pub type TransitionResult<T> = Result<T, TransitionError>;

/// A rejected transition. The record it was applied to is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job is already {status}; no further transitions are permitted")]
    Terminal { status: JobStatus },

    #[error("cannot apply {event} to a {status} job")]
    InvalidTransition { event: &'static str, status: JobStatus },

    #[error("progress cannot go backwards ({current} -> {requested})")]
    ProgressRegression { current: u8, requested: u8 },

    #[error("intermediate progress must be below 100 (got {0})")]
    ProgressOutOfRange(u8),
}

/// Apply `event` to `record`, producing the next record.
pub fn transition(
    record: &JobRecord,
    event: JobEvent,
    now: DateTime<Utc>,
) -> TransitionResult<JobRecord> {
    if record.is_terminal() {
        return Err(TransitionError::Terminal {
            status: record.status,
        });
    }

    let mut next = record.clone();
    // Clock skew must never produce updated_at < created_at.
    next.updated_at = now.max(record.updated_at);

    match (record.status, event) {
        (JobStatus::Queued, JobEvent::Start) => {
            next.status = JobStatus::Running;
            next.progress = record.progress.max(START_PROGRESS_FLOOR);
        }
        (JobStatus::Running, JobEvent::Progress(p)) => {
            if p >= 100 {
                return Err(TransitionError::ProgressOutOfRange(p));
            }
            if p < record.progress {
                return Err(TransitionError::ProgressRegression {
                    current: record.progress,
                    requested: p,
                });
            }
            next.progress = p;
        }
        (JobStatus::Running, JobEvent::Succeed(result)) => {
            next.status = JobStatus::Completed;
            next.progress = 100;
            next.result = Some(result);
            next.error = None;
        }
        (JobStatus::Running, JobEvent::Fail(error)) => {
            next.status = JobStatus::Failed;
            next.error = Some(error);
            next.result = None;
        }
        (status, event) => {
            return Err(TransitionError::InvalidTransition {
                event: event.name(),
                status,
            });
        }
    }

    Ok(next)
}
