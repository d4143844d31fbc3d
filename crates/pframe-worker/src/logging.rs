//! Structured job logging utilities.

use tracing::{error, info, warn, Span};

use pframe_models::{JobId, JobKind};

/// Job logger for structured lifecycle logging.
///
/// Every line carries the job id and kind as fields so a single job can be
/// followed through submission, execution and cleanup.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    kind: JobKind,
}

impl JobLogger {
    pub fn new(job_id: &JobId, kind: JobKind) -> Self {
        Self {
            job_id: job_id.to_string(),
            kind,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, kind = %self.kind, "Job started: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, kind = %self.kind, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, kind = %self.kind, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, kind = %self.kind, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, kind = %self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, JobKind::Detect);

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.kind(), JobKind::Detect);
    }
}
