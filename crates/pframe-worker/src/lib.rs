//! Job orchestration for watermark embedding and detection.
//!
//! This crate provides:
//! - The `Dispatcher`: submission, polling, bounded scheduling
//! - Background execution driving each job through its lifecycle
//! - Scoped cleanup of uploaded input artifacts
//! - Collaborator interfaces for the processing engine and upload source
//! - A simulated engine and a local-disk upload source

pub mod cleanup;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod simulated;
pub mod upload;
pub mod writer;

pub use cleanup::ArtifactGuard;
pub use config::WorkerConfig;
pub use dispatcher::Dispatcher;
pub use engine::{EngineFailure, EngineResult, NoopProgress, ProcessingEngine, ProgressSink};
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, JobTask};
pub use logging::JobLogger;
pub use simulated::{SimulatedEngine, SimulatedEngineConfig};
pub use upload::{InputRef, LocalUploadSource, UploadError, UploadRequest, UploadResult, UploadSource, ALLOWED_VIDEO_EXTENSIONS};
pub use writer::{JobWriter, WriteError};
