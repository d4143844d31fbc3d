//! Shared data models for PhantomFrame.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and identifiers
//! - Embed/detect parameter sets
//! - The job lifecycle state machine

pub mod job;
pub mod params;
pub mod transition;

// Re-export common types
pub use job::{JobId, JobKind, JobRecord, JobStatus, SubmitResponse};
pub use params::{AnalysisMethod, DetectParams, EmbedParams, JobParams, QualityPreservation};
pub use transition::{transition, JobEvent, TransitionError, TransitionResult, START_PROGRESS_FLOOR};
