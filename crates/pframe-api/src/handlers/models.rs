//! Model management handlers.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ModelsStatusResponse {
    pub models_loaded: bool,
    pub available_models: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Report whether the engine's models are loaded.
pub async fn models_status(State(state): State<AppState>) -> Json<ModelsStatusResponse> {
    let engine = state.engine();
    Json(ModelsStatusResponse {
        models_loaded: engine.is_ready(),
        available_models: engine.available_models(),
        last_updated: engine.last_updated(),
    })
}

/// Reload the engine's models.
pub async fn reload_models(State(state): State<AppState>) -> ApiResult<Json<MessageResponse>> {
    match state.engine().reload().await {
        Ok(()) => {
            info!("Models reloaded");
            Ok(Json(MessageResponse {
                message: "Models reloaded successfully".to_string(),
            }))
        }
        Err(e) => {
            error!("Model reload failed: {}", e);
            Err(ApiError::internal("Model reload failed"))
        }
    }
}
