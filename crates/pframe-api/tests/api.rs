//! HTTP tests against the full router with in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use pframe_api::{create_router, ApiConfig, AppState};
use pframe_store::MemoryJobStore;
use pframe_worker::{LocalUploadSource, SimulatedEngine, SimulatedEngineConfig, WorkerConfig};

const BOUNDARY: &str = "pframe-test-boundary";

struct TestApp {
    router: Router,
    store: Arc<MemoryJobStore>,
    upload_dir: tempfile::TempDir,
}

fn build_test_app() -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryJobStore::new());
    let state = AppState::from_parts(
        ApiConfig::default(),
        WorkerConfig {
            upload_dir: upload_dir.path().to_path_buf(),
            ..WorkerConfig::default()
        },
        store.clone(),
        Arc::new(SimulatedEngine::new(
            SimulatedEngineConfig::instant().with_detection_rate(1.0),
        )),
        Arc::new(LocalUploadSource::new(upload_dir.path())),
    );

    TestApp {
        router: create_router(state, None),
        store,
        upload_dir,
    }
}

fn multipart(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_form(app: &TestApp, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn wait_for_terminal(app: &TestApp, job_id: &str) -> Value {
    for _ in 0..500 {
        let (status, record) = get(app, &format!("/job/{job_id}")).await;
        assert_eq!(status, StatusCode::OK);
        if record["status"] == "completed" || record["status"] == "failed" {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never finished");
}

fn upload_dir_entries(app: &TestApp) -> usize {
    std::fs::read_dir(app.upload_dir.path())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn health_reports_healthy() {
    let app = build_test_app();
    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn response_carries_request_id() {
    let app = build_test_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn embed_submission_completes() {
    let app = build_test_app();
    let body = multipart(
        Some(("holiday.MP4", b"not really a video")),
        &[("payload", "owner:42"), ("seed", "7"), ("quality_preservation", "medium")],
    );

    let (status, submitted) = post_form(&app, "/watermark/embed", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["status"], "queued");
    let job_id = submitted["job_id"].as_str().unwrap().to_string();

    let record = wait_for_terminal(&app, &job_id).await;
    assert_eq!(record["status"], "completed");
    assert_eq!(record["progress"], 100);
    assert_eq!(record["kind"], "embed");
    assert_eq!(record["result"]["payload"], "owner:42");
    assert_eq!(record["result"]["seed"], 7);
    assert_eq!(record["result"]["quality_preservation"], "medium");
    assert_eq!(record["result"]["output_path"], "processed/watermarked_holiday.mp4");
    assert!(record["error"].is_null());
}

#[tokio::test]
async fn detect_submission_completes() {
    let app = build_test_app();
    let body = multipart(Some(("clip.webm", b"frames")), &[("analysis_method", "basic")]);

    let (status, submitted) = post_form(&app, "/watermark/detect", body).await;
    assert_eq!(status, StatusCode::OK);
    let job_id = submitted["job_id"].as_str().unwrap().to_string();

    let record = wait_for_terminal(&app, &job_id).await;
    assert_eq!(record["status"], "completed");
    assert_eq!(record["result"]["detected"], true);
    assert_eq!(record["result"]["analysis_method"], "basic");
}

#[tokio::test]
async fn unsupported_extension_is_rejected_without_a_job() {
    let app = build_test_app();
    let body = multipart(Some(("notes.txt", b"hello")), &[("payload", "x")]);

    let (status, body) = post_form(&app, "/watermark/embed", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid video format");
    assert!(app.store.is_empty().await);
    assert_eq!(upload_dir_entries(&app), 0);
}

#[tokio::test]
async fn missing_payload_is_rejected() {
    let app = build_test_app();
    let body = multipart(Some(("clip.mp4", b"x")), &[]);

    let (status, body) = post_form(&app, "/watermark/embed", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("payload"));
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn out_of_range_params_are_rejected() {
    let app = build_test_app();

    let body = multipart(Some(("clip.mp4", b"x")), &[("payload", "p"), ("block_density", "0.95")]);
    let (status, _) = post_form(&app, "/watermark/embed", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = multipart(Some(("clip.mp4", b"x")), &[("block_size", "128")]);
    let (status, _) = post_form(&app, "/watermark/detect", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = multipart(Some(("clip.mp4", b"x")), &[("analysis_method", "magic")]);
    let (status, _) = post_form(&app, "/watermark/detect", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.store.is_empty().await);
    assert_eq!(upload_dir_entries(&app), 0);
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let app = build_test_app();
    let body = multipart(None, &[("payload", "p")]);

    let (status, _) = post_form(&app, "/watermark/embed", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = build_test_app();

    let (status, body) = get(&app, "/job/550e8400-e29b-41d4-a716-446655440000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Job not found");

    let (status, _) = get(&app, "/job/bad").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn models_status_and_reload() {
    let app = build_test_app();

    let (status, body) = get(&app, "/models/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models_loaded"], true);
    assert_eq!(body["available_models"].as_array().unwrap().len(), 3);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/models/reload")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Models reloaded successfully");
}
