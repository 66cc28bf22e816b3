//! DriveLedger Pipeline
//!
//! Wires telemetry, normalization, classification, the decision window and
//! attestation dispatch into one cooperative control loop.

pub mod config;
mod error;
mod logging;
mod runner;
pub mod startup;
mod stats;
pub mod status;

pub use config::PipelineConfig;
pub use error::{ConfigError, PipelineError};
pub use logging::init_logging;
pub use runner::{Observation, Pipeline};
pub use stats::{PipelineStats, SharedStats};
