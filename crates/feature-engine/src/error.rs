//! Feature Error Types

use thiserror::Error;

/// Errors while building or normalizing feature vectors.
///
/// Every variant is a configuration-integrity fault: retrying cannot fix it.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Reading lacks a feature the model requires
    #[error("Missing required feature: {0}")]
    MissingFeature(String),

    /// Reading carries a NaN or infinite value
    #[error("Feature {name} has non-finite value {value}")]
    NonFiniteValue { name: String, value: f64 },

    /// Stored feature order differs from the pipeline's feature order
    #[error("Feature order mismatch at position {position}: expected {expected}, found {found}")]
    OrderMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    /// Stored statistics cover a different number of features
    #[error("Feature count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// Feature list is empty or repeats a name
    #[error("Invalid feature schema: {0}")]
    InvalidSchema(String),

    /// Normalization statistics are unusable
    #[error("Invalid normalization parameters: {0}")]
    InvalidParameters(String),

    /// Artifact could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Artifact could not be parsed
    #[error("Failed to parse normalization parameters: {0}")]
    Parse(#[from] serde_json::Error),
}
