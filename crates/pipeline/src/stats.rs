//! Pipeline Statistics

use attestation::{AttestationRecord, DispatchOutcome};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to live statistics
pub type SharedStats = Arc<RwLock<PipelineStats>>;

/// Running counters for the control loop
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Readings classified and offered to the window
    pub readings_processed: u64,
    /// Readings dropped after a transient inference failure
    pub readings_skipped: u64,
    /// Windows closed with a best classification
    pub windows_flushed: u64,
    /// Windows closed without any classification
    pub empty_windows: u64,
    pub attestations_persisted: u64,
    pub attestations_dropped: u64,
    /// Persisted attestations per fault code
    pub attestations_by_label: BTreeMap<String, u64>,
    pub last_attestation: Option<AttestationRecord>,
    pub last_reference: Option<String>,
}

impl PipelineStats {
    /// Account for one dispatch
    pub fn record_outcome(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Persisted { record, reference } => {
                self.attestations_persisted += 1;
                *self
                    .attestations_by_label
                    .entry(record.fault.clone())
                    .or_insert(0) += 1;
                self.last_attestation = Some(record.clone());
                self.last_reference = Some(reference.clone());

                metrics::counter!("driveledger_attestations_persisted_total", "label" => record.fault.clone())
                    .increment(1);
            }
            DispatchOutcome::Dropped { .. } => {
                self.attestations_dropped += 1;
                metrics::counter!("driveledger_attestations_dropped_total").increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference_engine::ClassificationResult;
    use obd_telemetry::SensorReading;

    fn persisted(label: &str, token_id: u64) -> DispatchOutcome {
        let reading = SensorReading::from_pairs(None, [("rpm", 900.0)]);
        let result = ClassificationResult {
            label: label.to_string(),
            label_index: 0,
            confidence: 0.8,
            timestamp_ms: 0,
        };
        DispatchOutcome::Persisted {
            record: AttestationRecord::new(&result, &reading, token_id),
            reference: format!("car_data/{}", token_id),
        }
    }

    #[test]
    fn test_outcomes_counted() {
        let mut stats = PipelineStats::default();
        stats.record_outcome(&persisted("rpm_spike", 1));
        stats.record_outcome(&persisted("rpm_spike", 2));
        stats.record_outcome(&persisted("fuel_low", 3));
        stats.record_outcome(&DispatchOutcome::Dropped {
            token_id: None,
            reason: "exhausted".to_string(),
        });

        assert_eq!(stats.attestations_persisted, 3);
        assert_eq!(stats.attestations_dropped, 1);
        assert_eq!(stats.attestations_by_label["rpm_spike"], 2);
        assert_eq!(stats.last_reference.as_deref(), Some("car_data/3"));
        assert_eq!(stats.last_attestation.map(|r| r.unique_id), Some(3));
    }
}
