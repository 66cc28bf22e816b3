//! Telemetry Sources
//!
//! A telemetry source is a single, unbounded, time-paced stream of readings.

use crate::catalog::OBD_SIGNALS;
use crate::reading::SensorReading;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Characters allowed in a VIN (no I, O or Q)
pub const VIN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ1234567890";

/// Length of a VIN
pub const VIN_LENGTH: usize = 17;

/// Source of sensor readings.
///
/// `next` suspends the caller for the source's pacing interval and then yields
/// a reading. Sources never fail and never end; callers race `next` against
/// their own cancellation signal.
#[async_trait]
pub trait TelemetrySource: Send {
    /// Wait for and return the next reading
    async fn next(&mut self) -> SensorReading;

    /// Human-readable name for logging
    fn source_name(&self) -> &str;
}

/// Simulated OBD-II telemetry with uniformly distributed signal values
pub struct SimulatedSource {
    /// Pacing interval between readings
    interval: Duration,
    /// Fixed VIN; a fresh random VIN is drawn per reading when unset
    vehicle_id: Option<String>,
    rng: StdRng,
    /// Readings produced so far
    produced: u64,
}

impl SimulatedSource {
    /// Create a simulated source seeded from entropy
    pub fn new(interval: Duration) -> Self {
        info!("Creating simulated telemetry source: interval={:?}", interval);
        Self {
            interval,
            vehicle_id: None,
            rng: StdRng::from_entropy(),
            produced: 0,
        }
    }

    /// Create a deterministic simulated source
    pub fn seeded(interval: Duration, seed: u64) -> Self {
        info!(
            "Creating seeded simulated telemetry source: interval={:?}, seed={}",
            interval, seed
        );
        Self {
            interval,
            vehicle_id: None,
            rng: StdRng::seed_from_u64(seed),
            produced: 0,
        }
    }

    /// Report every reading under a fixed vehicle identifier
    pub fn with_vehicle_id(mut self, vehicle_id: impl Into<String>) -> Self {
        self.vehicle_id = Some(vehicle_id.into());
        self
    }

    /// Generate one reading without waiting
    pub fn generate(&mut self) -> SensorReading {
        let values: BTreeMap<String, f64> = OBD_SIGNALS
            .iter()
            .map(|signal| (signal.name.to_string(), signal.sample(&mut self.rng)))
            .collect();

        let vehicle_id = match &self.vehicle_id {
            Some(vin) => vin.clone(),
            None => random_vin(&mut self.rng),
        };

        self.produced += 1;
        SensorReading::new(Utc::now(), Some(vehicle_id), values)
    }

    /// Number of readings produced so far
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Pacing interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl TelemetrySource for SimulatedSource {
    async fn next(&mut self) -> SensorReading {
        tokio::time::sleep(self.interval).await;
        let reading = self.generate();
        debug!("Simulated reading #{} ({} values)", self.produced, reading.len());
        reading
    }

    fn source_name(&self) -> &str {
        "simulated-obd"
    }
}

fn random_vin<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..VIN_LENGTH)
        .map(|_| VIN_ALPHABET[rng.gen_range(0..VIN_ALPHABET.len())] as char)
        .collect()
}
