//! Job metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, gauge, histogram};

use pframe_models::JobKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "pframe_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "pframe_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "pframe_jobs_failed_total";
    pub const JOBS_REJECTED_TOTAL: &str = "pframe_jobs_rejected_total";
    pub const JOBS_ACTIVE: &str = "pframe_jobs_active";
    pub const JOB_DURATION_SECONDS: &str = "pframe_job_duration_seconds";
    pub const CLEANUP_FAILURES_TOTAL: &str = "pframe_cleanup_failures_total";
}

pub fn record_job_submitted(kind: JobKind) {
    counter!(names::JOBS_SUBMITTED_TOTAL, "kind" => kind.as_str()).increment(1);
}

pub fn record_job_completed(kind: JobKind, duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL, "kind" => kind.as_str()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "kind" => kind.as_str(), "outcome" => "completed")
        .record(duration_secs);
}

pub fn record_job_failed(kind: JobKind, duration_secs: f64) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind.as_str()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "kind" => kind.as_str(), "outcome" => "failed")
        .record(duration_secs);
}

/// Record a submission turned away before a job was created.
pub fn record_job_rejected(reason: &'static str) {
    counter!(names::JOBS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

pub fn set_active_jobs(count: usize) {
    gauge!(names::JOBS_ACTIVE).set(count as f64);
}

pub fn record_cleanup_failure() {
    counter!(names::CLEANUP_FAILURES_TOTAL).increment(1);
}
