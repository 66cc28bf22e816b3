//! Pipeline Error Types

use feature_engine::FeatureError;
use inference_engine::InferenceError;
use thiserror::Error;
use token_registry::RegistryError;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that stop the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Feature integrity fault: {0}")]
    Feature(#[from] FeatureError),

    #[error("Classifier fault: {0}")]
    Inference(#[from] InferenceError),

    #[error("Token registry fault: {0}")]
    Registry(#[from] RegistryError),

    #[error("Component setup failed: {0}")]
    Setup(String),

    #[error("Status server error: {0}")]
    Server(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether the error is a configuration-integrity fault
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Inference(e) => e.is_configuration_fault(),
            PipelineError::Server(_) => false,
            _ => true,
        }
    }
}
