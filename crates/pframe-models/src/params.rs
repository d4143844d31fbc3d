//! Parameter sets for embed and detect jobs.
//!
//! Ranges are enforced with `validator` at the submission boundary; the
//! orchestration core only checks that the parameters match the job kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationErrors};

use crate::job::JobKind;

fn default_seed() -> i64 {
    12345
}

fn default_block_density() -> f64 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_temporal_period() -> u32 {
    1
}

fn default_confidence_threshold() -> f64 {
    0.8
}

fn default_block_size() -> u32 {
    16
}

/// How aggressively embedding should preserve visual quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreservation {
    Low,
    Medium,
    #[default]
    High,
}

impl QualityPreservation {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreservation::Low => "low",
            QualityPreservation::Medium => "medium",
            QualityPreservation::High => "high",
        }
    }
}

impl fmt::Display for QualityPreservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityPreservation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("quality_preservation must be low, medium or high (got {})", other)),
        }
    }
}

/// Detection analysis method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    Basic,
    #[default]
    AiEnhanced,
    DeepLearning,
}

impl AnalysisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMethod::Basic => "basic",
            AnalysisMethod::AiEnhanced => "ai_enhanced",
            AnalysisMethod::DeepLearning => "deep_learning",
        }
    }
}

impl fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "ai_enhanced" => Ok(Self::AiEnhanced),
            "deep_learning" => Ok(Self::DeepLearning),
            other => Err(format!(
                "analysis_method must be basic, ai_enhanced or deep_learning (got {})",
                other
            )),
        }
    }
}

/// Parameters for watermark embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EmbedParams {
    /// Watermark payload to embed
    #[validate(length(min = 1, message = "payload must not be empty"))]
    pub payload: String,
    /// Random seed for watermark generation
    #[serde(default = "default_seed")]
    pub seed: i64,
    /// Block density for embedding
    #[serde(default = "default_block_density")]
    #[validate(range(min = 0.1, max = 0.9))]
    pub block_density: f64,
    /// Use adaptive embedding
    #[serde(default = "default_true")]
    pub adaptive_embedding: bool,
    /// Temporal embedding period
    #[serde(default = "default_temporal_period")]
    #[validate(range(min = 1, max = 10))]
    pub temporal_period: u32,
    /// Quality preservation level
    #[serde(default)]
    pub quality_preservation: QualityPreservation,
}

impl EmbedParams {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            seed: default_seed(),
            block_density: default_block_density(),
            adaptive_embedding: true,
            temporal_period: default_temporal_period(),
            quality_preservation: QualityPreservation::default(),
        }
    }
}

/// Parameters for watermark detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DetectParams {
    /// Detection confidence threshold
    #[serde(default = "default_confidence_threshold")]
    #[validate(range(min = 0.1, max = 1.0))]
    pub confidence_threshold: f64,
    /// Analysis method
    #[serde(default)]
    pub analysis_method: AnalysisMethod,
    /// Block size for analysis
    #[serde(default = "default_block_size")]
    #[validate(range(min = 8, max = 64))]
    pub block_size: u32,
    /// Enable temporal analysis
    #[serde(default = "default_true")]
    pub temporal_analysis: bool,
    /// Enable batch processing
    #[serde(default)]
    pub batch_processing: bool,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            analysis_method: AnalysisMethod::default(),
            block_size: default_block_size(),
            temporal_analysis: true,
            batch_processing: false,
        }
    }
}

/// Parameter set bound to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobParams {
    Embed(EmbedParams),
    Detect(DetectParams),
}

impl JobParams {
    /// The job kind these parameters belong to.
    pub fn kind(&self) -> JobKind {
        match self {
            JobParams::Embed(_) => JobKind::Embed,
            JobParams::Detect(_) => JobKind::Detect,
        }
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            JobParams::Embed(p) => p.validate(),
            JobParams::Detect(p) => p.validate(),
        }
    }
}
