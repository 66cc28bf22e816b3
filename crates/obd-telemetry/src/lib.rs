//! OBD-II Telemetry
//!
//! Sensor readings, the 20-signal OBD catalog used as the model's feature
//! order, and a time-paced simulated telemetry source.

mod catalog;
mod reading;
mod source;

pub use catalog::{default_feature_names, signal, Signal, SignalKind, OBD_SIGNALS};
pub use reading::SensorReading;
pub use source::{SimulatedSource, TelemetrySource, VIN_ALPHABET, VIN_LENGTH};
