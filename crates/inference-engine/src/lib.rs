//! Fault Classification Engine
//!
//! Loads the trained model artifact and label vocabulary once at startup and
//! turns normalized feature vectors into top-1 fault classifications.

mod engine;
mod model;
mod vocabulary;

pub use engine::{top1, ClassificationResult, Classifier};
pub use model::{load_model, LinearSoftmaxModel, OnnxModel, ProbabilityModel};
pub use vocabulary::LabelVocabulary;

use thiserror::Error;

/// Errors during model loading or inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: usize, actual: usize },
    #[error("Model outputs {outputs} classes but vocabulary has {labels} labels")]
    OutputWidthMismatch { outputs: usize, labels: usize },
    #[error("Invalid label vocabulary: {0}")]
    InvalidVocabulary(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse artifact: {0}")]
    Parse(#[from] serde_json::Error),
}

impl InferenceError {
    /// Whether the error indicates a misconfigured artifact set
    pub fn is_configuration_fault(&self) -> bool {
        !matches!(self, InferenceError::InferenceFailed(_))
    }
}
