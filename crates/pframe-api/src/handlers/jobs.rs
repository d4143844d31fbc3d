//! Job status handlers.

use axum::extract::{Path, State};
use axum::Json;

use pframe_models::{JobId, JobRecord};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Get job status and results.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    // Malformed ids can never exist; skip the store round-trip
    if !is_valid_job_id(&job_id) {
        return Err(ApiError::not_found("Job not found"));
    }

    state
        .dispatcher
        .poll(&JobId::from_string(job_id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

/// Validate job ID format.
///
/// Valid format: alphanumeric characters and hyphens only, 8-64 chars.
fn is_valid_job_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 64 || id.len() < 8 {
        return false;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_job_ids() {
        assert!(is_valid_job_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_valid_job_id(JobId::new().as_str()));
        assert!(is_valid_job_id("abc12345"));
    }

    #[test]
    fn test_invalid_job_ids() {
        assert!(!is_valid_job_id(""));
        assert!(!is_valid_job_id("short"));
        assert!(!is_valid_job_id("has space in it"));
        assert!(!is_valid_job_id("../../etc/passwd"));
        assert!(!is_valid_job_id("job:12345678"));
        assert!(!is_valid_job_id(&"a".repeat(65)));
    }
}
