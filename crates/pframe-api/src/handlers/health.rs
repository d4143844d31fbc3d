//! Health check handlers.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub active_jobs: usize,
    pub pending_jobs: usize,
}

/// Health check endpoint. Fails with 503 when the job store is unreachable.
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    if let Err(e) = state.store().ping().await {
        error!("Health check failed: {}", e);
        return Err(ApiError::Unavailable("Service unhealthy".to_string()));
    }

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        active_jobs: state.dispatcher.active_jobs(),
        pending_jobs: state.dispatcher.pending_jobs(),
    }))
}
