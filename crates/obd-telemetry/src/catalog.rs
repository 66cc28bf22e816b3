//! OBD-II Signal Catalog
//!
//! Defines the sensor signals the fault model was trained on, in model order,
//! together with the value ranges the simulator draws from.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How a signal's values are distributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    /// Real-valued measurement
    Continuous,
    /// Counter or whole-number measurement
    Integer,
}

/// A single OBD-II signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    /// Feature name, as used in readings and artifacts
    pub name: &'static str,
    /// Lower bound of the simulated range
    pub min: f64,
    /// Upper bound of the simulated range
    pub max: f64,
    /// Value distribution
    pub kind: SignalKind,
}

impl Signal {
    const fn continuous(name: &'static str, min: f64, max: f64) -> Self {
        Self { name, min, max, kind: SignalKind::Continuous }
    }

    const fn integer(name: &'static str, min: f64, max: f64) -> Self {
        Self { name, min, max, kind: SignalKind::Integer }
    }

    /// Draw a uniformly distributed value from the signal's range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self.kind {
            SignalKind::Continuous => rng.gen_range(self.min..=self.max),
            SignalKind::Integer => rng.gen_range(self.min as i64..=self.max as i64) as f64,
        }
    }

    /// Check whether a value lies within the signal's range
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// The 20 signals in the order the classifier expects them
pub const OBD_SIGNALS: [Signal; 20] = [
    Signal::continuous("engine_load", 0.0, 100.0),
    Signal::continuous("coolant_temp", 70.0, 110.0),
    Signal::continuous("fuel_pressure", 0.0, 100.0),
    Signal::continuous("intake_manifold_p", 20.0, 120.0),
    Signal::integer("rpm", 600.0, 4000.0),
    Signal::continuous("speed", 0.0, 200.0),
    Signal::continuous("timing_advance", -10.0, 40.0),
    Signal::continuous("intake_air_temp", 10.0, 50.0),
    Signal::continuous("air_flow_rate", 0.0, 300.0),
    Signal::continuous("throttle_pos", 0.0, 100.0),
    Signal::integer("engine_run_time", 0.0, 36_000.0),
    Signal::continuous("fuel_level", 0.0, 100.0),
    Signal::integer("warmups_since_clear", 0.0, 50.0),
    Signal::continuous("barometric_p", 80.0, 110.0),
    Signal::continuous("ambient_air_temp", -10.0, 40.0),
    Signal::continuous("cmd_throttle_act", 0.0, 100.0),
    Signal::integer("time_with_mil_on", 0.0, 18_000.0),
    Signal::integer("time_since_codes", 0.0, 604_800.0),
    Signal::continuous("hybrid_batt_life", 0.0, 100.0),
    Signal::continuous("fuel_rate", 0.0, 50.0),
];

/// Feature names in catalog order
pub fn default_feature_names() -> Vec<String> {
    OBD_SIGNALS.iter().map(|s| s.name.to_string()).collect()
}

/// Look up a signal by feature name
pub fn signal(name: &str) -> Option<&'static Signal> {
    OBD_SIGNALS.iter().find(|s| s.name == name)
}
