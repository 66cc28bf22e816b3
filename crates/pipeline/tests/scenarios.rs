//! End-to-end pipeline scenarios with fake model, registry and sink.

use async_trait::async_trait;
use attestation::{AttestationDispatcher, AttestationRecord, AttestationSink, SinkError};
use feature_engine::{FeatureNormalizer, FeatureSchema, NormalizationParameters};
use inference_engine::{Classifier, InferenceError, LabelVocabulary, ProbabilityModel};
use obd_telemetry::{default_feature_names, SensorReading, SimulatedSource};
use pipeline::{Pipeline, PipelineError};
use resilience::RetryPolicy;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use token_registry::{IdSpace, IdentifierIssuer, LocalRegistry, MemoryRegistry};
use tokio_util::sync::CancellationToken;

const LABELS: [&str; 3] = ["normal", "fuel_low", "rpm_spike"];
const NORMAL: [f32; 3] = [0.5, 0.3, 0.2];
const FUEL_LOW: [f32; 3] = [0.38, 0.62, 0.0];
const RPM_SPIKE: [f32; 3] = [0.09, 0.0, 0.91];

/// Replays one probability vector per inference, then `NORMAL`
struct ScriptedModel {
    input_width: usize,
    script: Mutex<VecDeque<Vec<f32>>>,
    fail: bool,
}

impl ScriptedModel {
    fn new(input_width: usize, script: Vec<[f32; 3]>) -> Self {
        Self {
            input_width,
            script: Mutex::new(script.into_iter().map(|p| p.to_vec()).collect()),
            fail: false,
        }
    }

    fn failing(input_width: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(input_width, Vec::new())
        }
    }
}

impl ProbabilityModel for ScriptedModel {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn output_width(&self) -> usize {
        LABELS.len()
    }

    fn infer(&self, _features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if self.fail {
            return Err(InferenceError::InferenceFailed("accelerator reset".to_string()));
        }
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| NORMAL.to_vec()))
    }
}

/// Records persisted attestations after replaying scripted failures
#[derive(Default)]
struct RecordingSink {
    failures: Mutex<VecDeque<SinkError>>,
    attempts: Mutex<Vec<u64>>,
    records: Mutex<Vec<AttestationRecord>>,
}

impl RecordingSink {
    fn records(&self) -> Vec<AttestationRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttestationSink for RecordingSink {
    async fn persist(&self, record: &AttestationRecord) -> Result<String, SinkError> {
        self.attempts.lock().unwrap().push(record.unique_id);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(format!("car_data/{}", record.unique_id))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Harness {
    pipeline: Pipeline,
    local: Arc<MemoryRegistry>,
    sink: Arc<RecordingSink>,
}

fn harness(features: Vec<String>, model: ScriptedModel, sink: RecordingSink) -> Harness {
    let n = features.len();
    let params = NormalizationParameters::new(features.clone(), vec![0.0; n], vec![1.0; n]).unwrap();
    let normalizer = FeatureNormalizer::new(FeatureSchema::new(features).unwrap(), params).unwrap();
    let classifier =
        Classifier::new(Arc::new(model), LabelVocabulary::new(LABELS).unwrap(), n).unwrap();

    let local = Arc::new(MemoryRegistry::new());
    let issuer = IdentifierIssuer::new(
        local.clone(),
        None,
        IdSpace::new(1, 1_000_000).unwrap(),
        64,
        RetryPolicy::default(),
    )
    .with_seed(3);

    let sink = Arc::new(sink);
    let dispatcher =
        AttestationDispatcher::new(Arc::new(issuer), sink.clone(), None, RetryPolicy::default());

    Harness {
        pipeline: Pipeline::new(normalizer, classifier, dispatcher, Duration::from_secs(10)),
        local,
        sink,
    }
}

fn two_features() -> Vec<String> {
    vec!["rpm".to_string(), "speed".to_string()]
}

fn reading(second: u64) -> SensorReading {
    SensorReading::from_pairs(
        Some("1HGCM82633A004352".to_string()),
        [("rpm", second as f64 * 100.0), ("speed", 40.0)],
    )
}

/// fuel_low@1s, rpm_spike@4s, normal otherwise
fn window_script() -> Vec<[f32; 3]> {
    vec![FUEL_LOW, NORMAL, NORMAL, RPM_SPIKE]
}

#[tokio::test(start_paused = true)]
async fn ten_second_window_attests_best_classification() {
    let Harness {
        mut pipeline,
        local,
        sink,
    } = harness(
        two_features(),
        ScriptedModel::new(2, window_script()),
        RecordingSink::default(),
    );

    for second in 1..=10 {
        tokio::time::advance(Duration::from_secs(1)).await;
        let outcome = pipeline.process(reading(second)).await.unwrap();
        if second < 10 {
            assert!(outcome.is_none(), "unexpected flush at {}s", second);
        } else {
            assert!(outcome.is_some_and(|o| o.is_persisted()));
        }
    }

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fault, "rpm_spike");
    assert!((records[0].confidence - 0.91).abs() < 1e-6);
    assert_eq!(records[0].sensor_data["rpm"], 400.0);
    assert_eq!(records[0].vin.as_deref(), Some("1HGCM82633A004352"));

    assert_eq!(local.len().await.unwrap(), 1);
    assert_eq!(sink.attempts.lock().unwrap().len(), 1);

    let stats = pipeline.stats().read().await.clone();
    assert_eq!(stats.windows_flushed, 1);
    assert_eq!(stats.attestations_persisted, 1);
    assert_eq!(stats.attestations_by_label["rpm_spike"], 1);
}

#[tokio::test(start_paused = true)]
async fn empty_windows_issue_nothing() {
    let Harness {
        mut pipeline,
        local,
        sink,
    } = harness(two_features(), ScriptedModel::failing(2), RecordingSink::default());

    for second in 1..=25 {
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(pipeline.process(reading(second)).await.unwrap().is_none());
    }

    assert_eq!(local.len().await.unwrap(), 0);
    assert!(sink.attempts.lock().unwrap().is_empty());

    let stats = pipeline.stats().read().await.clone();
    assert_eq!(stats.readings_skipped, 25);
    assert_eq!(stats.empty_windows, 2);
    assert_eq!(stats.windows_flushed, 0);
}

#[tokio::test(start_paused = true)]
async fn transient_sink_failures_reuse_one_token() {
    let sink = RecordingSink::default();
    sink.failures.lock().unwrap().extend([
        SinkError::TransientIo("connection reset".to_string()),
        SinkError::TransientIo("HTTP 503".to_string()),
    ]);
    let Harness {
        mut pipeline,
        local,
        sink,
    } = harness(two_features(), ScriptedModel::new(2, window_script()), sink);

    let mut outcome = None;
    for second in 1..=10 {
        tokio::time::advance(Duration::from_secs(1)).await;
        outcome = pipeline.process(reading(second)).await.unwrap();
    }

    assert!(outcome.is_some_and(|o| o.is_persisted()));
    let attempts = sink.attempts.lock().unwrap().clone();
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|id| *id == attempts[0]));
    assert_eq!(local.len().await.unwrap(), 1);
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn permanent_rejection_drops_and_continues() {
    let sink = RecordingSink::default();
    sink.failures
        .lock()
        .unwrap()
        .push_back(SinkError::PermanentRejection("HTTP 409: duplicate key".to_string()));
    let Harness {
        mut pipeline, sink, ..
    } = harness(two_features(), ScriptedModel::new(2, window_script()), sink);

    for second in 1..=20 {
        tokio::time::advance(Duration::from_secs(1)).await;
        pipeline.process(reading(second)).await.unwrap();
    }

    // First window dropped after one attempt, second window persisted
    assert_eq!(sink.attempts.lock().unwrap().len(), 2);
    assert_eq!(sink.records().len(), 1);

    let stats = pipeline.stats().read().await.clone();
    assert_eq!(stats.attestations_dropped, 1);
    assert_eq!(stats.attestations_persisted, 1);
}

#[tokio::test]
async fn missing_feature_is_fatal() {
    let Harness { mut pipeline, .. } = harness(
        two_features(),
        ScriptedModel::new(2, Vec::new()),
        RecordingSink::default(),
    );

    let partial = SensorReading::from_pairs(None, [("rpm", 800.0)]);
    let err = pipeline.process(partial).await.unwrap_err();
    assert!(matches!(err, PipelineError::Feature(_)));
    assert!(err.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn run_until_cancelled_discards_pending_best() {
    let features = default_feature_names();
    let n = features.len();
    let Harness {
        mut pipeline,
        local,
        sink,
    } = harness(features, ScriptedModel::new(n, window_script()), RecordingSink::default());

    let mut source = SimulatedSource::seeded(Duration::from_secs(1), 42);
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        canceller.cancel();
    });

    let stats = pipeline.run(&mut source, cancel).await.unwrap();

    assert_eq!(stats.readings_processed, 10);
    assert_eq!(stats.windows_flushed, 1);
    assert_eq!(stats.attestations_persisted, 1);
    assert_eq!(sink.records()[0].fault, "rpm_spike");
    assert_eq!(local.len().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_keeps_window_counts_from_earlier_processing() {
    let Harness { mut pipeline, .. } =
        harness(two_features(), ScriptedModel::failing(2), RecordingSink::default());

    for second in 1..=15 {
        tokio::time::advance(Duration::from_secs(1)).await;
        pipeline.process(reading(second)).await.unwrap();
    }
    assert_eq!(pipeline.stats().read().await.empty_windows, 1);

    let mut source = SimulatedSource::seeded(Duration::from_secs(1), 7);
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        canceller.cancel();
    });

    let stats = pipeline.run(&mut source, cancel).await.unwrap();
    assert_eq!(stats.readings_skipped, 17);
    assert_eq!(stats.empty_windows, 1);
}
