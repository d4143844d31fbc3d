//! Watermark submission handlers.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use axum::extract::{Multipart, State};
use axum::Json;
use tracing::{info, warn};
use validator::Validate;

use pframe_models::{DetectParams, EmbedParams, JobKind, JobParams, SubmitResponse};
use pframe_worker::upload::validate_video_filename;
use pframe_worker::UploadRequest;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Uploaded file part.
struct UploadedFile {
    filename: String,
    data: Vec<u8>,
}

/// A parsed multipart form: one `file` part plus text fields.
struct UploadForm {
    file: Option<UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm {
            file: None,
            fields: HashMap::new(),
        };

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| ApiError::bad_request("File part has no filename"))?;
                // Reject before buffering the whole video
                validate_video_filename(&filename)?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
                form.file = Some(UploadedFile {
                    filename,
                    data: data.to_vec(),
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid field {}: {}", name, e)))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    fn take_file(&mut self) -> ApiResult<UploadedFile> {
        self.file
            .take()
            .ok_or_else(|| ApiError::bad_request("Missing file upload"))
    }

    fn required(&self, name: &str) -> ApiResult<String> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::Validation(format!("{} is required", name)))
    }

    fn parse_or<T>(&self, name: &str, default: T) -> ApiResult<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.fields.get(name).map(|s| s.trim()) {
            None | Some("") => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| ApiError::Validation(format!("Invalid {}: {}", name, e))),
        }
    }

    fn flag_or(&self, name: &str, default: bool) -> ApiResult<bool> {
        match self.fields.get(name).map(|s| s.trim().to_lowercase()) {
            None => Ok(default),
            Some(raw) => match raw.as_str() {
                "" => Ok(default),
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ApiError::Validation(format!("Invalid {}: expected a boolean", name))),
            },
        }
    }
}

/// Embed a watermark into an uploaded video.
pub async fn embed_watermark(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<SubmitResponse>> {
    let mut form = UploadForm::read(multipart).await?;
    let defaults = EmbedParams::new("");

    let params = EmbedParams {
        payload: form.required("payload")?,
        seed: form.parse_or("seed", defaults.seed)?,
        block_density: form.parse_or("block_density", defaults.block_density)?,
        adaptive_embedding: form.flag_or("adaptive_embedding", defaults.adaptive_embedding)?,
        temporal_period: form.parse_or("temporal_period", defaults.temporal_period)?,
        quality_preservation: form.parse_or("quality_preservation", defaults.quality_preservation)?,
    };
    params
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let file = form.take_file()?;
    submit(&state, JobKind::Embed, file, JobParams::Embed(params)).await
}

/// Detect a watermark in an uploaded video.
pub async fn detect_watermark(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<SubmitResponse>> {
    let mut form = UploadForm::read(multipart).await?;
    let defaults = DetectParams::default();

    let params = DetectParams {
        confidence_threshold: form.parse_or("confidence_threshold", defaults.confidence_threshold)?,
        analysis_method: form.parse_or("analysis_method", defaults.analysis_method)?,
        block_size: form.parse_or("block_size", defaults.block_size)?,
        temporal_analysis: form.flag_or("temporal_analysis", defaults.temporal_analysis)?,
        batch_processing: form.flag_or("batch_processing", defaults.batch_processing)?,
    };
    params
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let file = form.take_file()?;
    submit(&state, JobKind::Detect, file, JobParams::Detect(params)).await
}

/// Materialize the upload and hand it to the dispatcher.
async fn submit(
    state: &AppState,
    kind: JobKind,
    file: UploadedFile,
    params: JobParams,
) -> ApiResult<Json<SubmitResponse>> {
    let bytes = file.data.len() as u64;
    let input = state
        .uploads
        .materialize(UploadRequest::new(file.filename, file.data))
        .await?;

    match state.dispatcher.submit(kind, input.clone(), params).await {
        Ok(response) => {
            metrics::record_upload_bytes(kind.as_str(), bytes);
            info!(job_id = %response.job_id, kind = %kind, bytes, "Accepted watermark job");
            Ok(Json(response))
        }
        Err(e) => {
            if let Err(release_err) = state.uploads.release(&input).await {
                warn!(
                    path = %input.path.display(),
                    error = %release_err,
                    "Failed to release upload of rejected submission"
                );
            }
            Err(e.into())
        }
    }
}
