//! Scoped release of transient input artifacts.

use std::sync::Arc;

use tracing::{debug, warn};

use pframe_models::JobId;

use crate::metrics;
use crate::upload::{InputRef, UploadSource};

/// Owns a job's input artifact and releases it exactly once.
///
/// Call [`release`](ArtifactGuard::release) on every normal exit path. If the
/// guard is dropped without that (the owning task was cancelled), release is
/// scheduled on the current runtime instead. Release failures are logged and
/// never affect the job's status.
pub struct ArtifactGuard {
    job_id: JobId,
    source: Arc<dyn UploadSource>,
    input: InputRef,
    released: bool,
}

impl ArtifactGuard {
    pub fn new(job_id: JobId, source: Arc<dyn UploadSource>, input: InputRef) -> Self {
        Self {
            job_id,
            source,
            input,
            released: false,
        }
    }

    pub fn input(&self) -> &InputRef {
        &self.input
    }

    /// Release the artifact. Returns `true` if it was deleted.
    pub async fn release(mut self) -> bool {
        self.released = true;
        release_artifact(&self.job_id, self.source.as_ref(), &self.input).await
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let job_id = self.job_id.clone();
        let source = Arc::clone(&self.source);
        let input = self.input.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(job_id = %job_id, "Artifact guard dropped, scheduling release");
                handle.spawn(async move {
                    release_artifact(&job_id, source.as_ref(), &input).await;
                });
            }
            Err(_) => {
                warn!(
                    job_id = %job_id,
                    path = %input.path.display(),
                    "Artifact guard dropped outside a runtime; input left on disk"
                );
            }
        }
    }
}

async fn release_artifact(job_id: &JobId, source: &dyn UploadSource, input: &InputRef) -> bool {
    match source.release(input).await {
        Ok(()) => {
            debug!(job_id = %job_id, path = %input.path.display(), "Input artifact released");
            true
        }
        Err(e) if e.is_not_found() => {
            warn!(job_id = %job_id, path = %input.path.display(), "Input artifact already gone");
            false
        }
        Err(e) => {
            metrics::record_cleanup_failure();
            warn!(
                job_id = %job_id,
                path = %input.path.display(),
                error = %e,
                "Failed to release input artifact"
            );
            false
        }
    }
}
