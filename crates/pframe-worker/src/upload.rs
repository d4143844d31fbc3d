//! Upload source: materializes uploaded inputs as transient artifacts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Video container extensions accepted for processing.
pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

pub type UploadResult<T> = Result<T, UploadError>;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid video format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// The artifact was already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, UploadError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Raw upload as received from a client.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub data: Vec<u8>,
}

impl UploadRequest {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }
}

/// Reference to a materialized input artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRef {
    /// Where the artifact lives
    pub path: PathBuf,
    /// Client-supplied file name
    pub original_name: String,
    /// Artifact size
    pub size_bytes: u64,
}

impl InputRef {
    /// File stem of the original upload, used to name derived outputs.
    pub fn stem(&self) -> &str {
        Path::new(&self.original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("input")
    }
}

/// Delivers raw inputs to the orchestration core and releases them again.
#[async_trait]
pub trait UploadSource: Send + Sync {
    /// Persist an upload and return a reference to it.
    async fn materialize(&self, request: UploadRequest) -> UploadResult<InputRef>;

    /// Delete the artifact. Errors with `NotFound` if it is already gone.
    async fn release(&self, input: &InputRef) -> UploadResult<()>;

    /// Whether the artifact is still present.
    async fn exists(&self, input: &InputRef) -> bool;
}

/// Reject file names without an accepted video extension.
pub fn validate_video_filename(filename: &str) -> UploadResult<()> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext {
        Some(ext) if ALLOWED_VIDEO_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(UploadError::InvalidFormat(filename.to_string())),
    }
}

/// Strip directories and anything outside `[A-Za-z0-9._-]`.
fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");

    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Upload source writing into a local directory.
#[derive(Debug, Clone)]
pub struct LocalUploadSource {
    dir: PathBuf,
}

impl LocalUploadSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl UploadSource for LocalUploadSource {
    async fn materialize(&self, request: UploadRequest) -> UploadResult<InputRef> {
        validate_video_filename(&request.filename)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(format!(
            "{}_{}",
            Uuid::new_v4(),
            sanitize_filename(&request.filename)
        ));
        tokio::fs::write(&path, &request.data).await?;

        debug!(path = %path.display(), bytes = request.data.len(), "Materialized upload");
        Ok(InputRef {
            path,
            original_name: request.filename,
            size_bytes: request.data.len() as u64,
        })
    }

    async fn release(&self, input: &InputRef) -> UploadResult<()> {
        tokio::fs::remove_file(&input.path).await?;
        debug!(path = %input.path.display(), "Released upload");
        Ok(())
    }

    async fn exists(&self, input: &InputRef) -> bool {
        tokio::fs::try_exists(&input.path).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_video_extensions_case_insensitively() {
        assert!(validate_video_filename("clip.mp4").is_ok());
        assert!(validate_video_filename("CLIP.MOV").is_ok());
        assert!(validate_video_filename("a.b.webm").is_ok());
    }

    #[test]
    fn rejects_other_extensions() {
        assert!(matches!(
            validate_video_filename("notes.txt"),
            Err(UploadError::InvalidFormat(_))
        ));
        assert!(validate_video_filename("noext").is_err());
    }

    #[test]
    fn sanitize_strips_directories_and_odd_chars() {
        assert_eq!(sanitize_filename("../../etc/passwd.mp4"), "passwd.mp4");
        assert_eq!(sanitize_filename("my clip (1).mp4"), "my_clip__1_.mp4");
    }

    #[test]
    fn stem_of_original_name() {
        let input = InputRef {
            path: PathBuf::from("/tmp/x"),
            original_name: "holiday.mkv".into(),
            size_bytes: 0,
        };
        assert_eq!(input.stem(), "holiday");
    }

    #[tokio::test]
    async fn materialize_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalUploadSource::new(dir.path().join("uploads"));

        let input = source
            .materialize(UploadRequest::new("video.mp4", b"frames".to_vec()))
            .await
            .unwrap();

        assert!(source.exists(&input).await);
        assert_eq!(input.size_bytes, 6);
        assert!(input.path.starts_with(source.dir()));
        assert!(input.path.to_string_lossy().ends_with("_video.mp4"));

        source.release(&input).await.unwrap();
        assert!(!source.exists(&input).await);

        let err = source.release(&input).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn materialize_rejects_bad_format_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalUploadSource::new(dir.path());

        let err = source
            .materialize(UploadRequest::new("document.pdf", vec![1, 2, 3]))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::InvalidFormat(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
