//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{
    detect_watermark, embed_watermark, get_job, health, models_status, reload_models,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, propagate_request_id_layer, request_logging, set_request_id_layer,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let watermark_routes = Router::new()
        .route("/watermark/embed", post(embed_watermark))
        .route("/watermark/detect", post(detect_watermark))
        // Multipart extraction has its own, much smaller, default limit
        .layer(DefaultBodyLimit::max(state.config.max_body_size));

    let job_routes = Router::new().route("/job/:job_id", get(get_job));

    let model_routes = Router::new()
        .route("/models/status", get(models_status))
        .route("/models/reload", post(reload_models));

    let health_routes = Router::new().route("/health", get(health));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(watermark_routes)
        .merge(job_routes)
        .merge(model_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
