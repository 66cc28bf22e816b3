//! Pipeline Configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `DRIVELEDGER__SECTION__KEY` environment variables.

use crate::ConfigError;
use attestation::{MintConfig, SinkConfig};
use config::{Config, Environment, File};
use decision_window::WindowConfig;
use obd_telemetry::default_feature_names;
use resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use token_registry::{IssuerConfig, RemoteRegistryConfig};
use tracing::info;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DRIVELEDGER";

/// Telemetry source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Pacing interval between readings in milliseconds
    pub interval_ms: u64,
    /// Fixed VIN attached to every reading
    pub vehicle_id: Option<String>,
    /// Seed for a reproducible simulated stream
    pub seed: Option<u64>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            vehicle_id: None,
            seed: None,
        }
    }
}

impl TelemetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Model artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// `.onnx` or `.json` classifier artifact
    pub model_path: PathBuf,
    /// Normalization parameters artifact
    pub scaler_path: PathBuf,
    /// Label vocabulary artifact
    pub labels_path: PathBuf,
    /// Feature order expected by the model
    pub feature_names: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.onnx"),
            scaler_path: PathBuf::from("models/scaler.json"),
            labels_path: PathBuf::from("models/labels.json"),
            feature_names: default_feature_names(),
        }
    }
}

/// Status API settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Listen address, e.g. `0.0.0.0:8080`; disabled when unset
    pub bind: Option<String>,
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub telemetry: TelemetryConfig,
    pub model: ModelConfig,
    pub window: WindowConfig,
    pub issuer: IssuerConfig,
    pub remote_registry: RemoteRegistryConfig,
    pub sink: SinkConfig,
    pub mint: MintConfig,
    pub retry: RetryPolicy,
    pub status: StatusConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Load configuration from an optional file and the environment.
    ///
    /// A missing file is only an error when `path` was given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("driveledger").required(false),
        };

        let config: PipelineConfig = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        info!("Configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.telemetry.interval_ms == 0 {
            return invalid("telemetry.interval_ms must be positive".into());
        }
        if self.window.duration_secs == 0 {
            return invalid("window.duration_secs must be positive".into());
        }
        if let Err(e) = self.issuer.id_space() {
            return invalid(format!("issuer: {}", e));
        }
        if self.issuer.max_draws == 0 {
            return invalid("issuer.max_draws must be positive".into());
        }
        if let Err(e) = self.retry.validate() {
            return invalid(format!("retry: {}", e));
        }
        if self.model.feature_names.is_empty() {
            return invalid("model.feature_names must not be empty".into());
        }

        let mut seen = HashSet::new();
        for name in &self.model.feature_names {
            if !seen.insert(name.as_str()) {
                return invalid(format!("model.feature_names repeats {}", name));
            }
        }

        if self.sink.timeout_ms == 0 || self.remote_registry.timeout_ms == 0 {
            return invalid("HTTP timeouts must be positive".into());
        }
        if let Some(bind) = &self.status.bind {
            if bind.parse::<std::net::SocketAddr>().is_err() {
                return invalid(format!("status.bind is not a socket address: {}", bind));
            }
        }

        Ok(())
    }
}
