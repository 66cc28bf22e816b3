//! Control Loop
//!
//! One cooperative loop: wait for a reading, normalize, classify, update the
//! decision window, and dispatch the window's best when a boundary passes.

use crate::stats::{PipelineStats, SharedStats};
use crate::PipelineError;
use attestation::{AttestationDispatcher, DispatchOutcome};
use decision_window::{DecisionWindow, Scored, WindowFlush};
use feature_engine::FeatureNormalizer;
use inference_engine::{ClassificationResult, Classifier};
use obd_telemetry::{SensorReading, TelemetrySource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A classification together with the reading it was made from
#[derive(Debug, Clone)]
pub struct Observation {
    pub result: ClassificationResult,
    pub reading: SensorReading,
}

impl Scored for Observation {
    fn confidence(&self) -> f64 {
        self.result.confidence
    }
}

/// The attestation pipeline
pub struct Pipeline {
    normalizer: FeatureNormalizer,
    classifier: Classifier,
    dispatcher: AttestationDispatcher,
    window: DecisionWindow<Observation>,
    stats: SharedStats,
}

impl Pipeline {
    /// Assemble a pipeline; the first window opens now
    pub fn new(
        normalizer: FeatureNormalizer,
        classifier: Classifier,
        dispatcher: AttestationDispatcher,
        window_duration: Duration,
    ) -> Self {
        Self {
            normalizer,
            classifier,
            dispatcher,
            window: DecisionWindow::new(window_duration, Instant::now()),
            stats: Arc::new(RwLock::new(PipelineStats::default())),
        }
    }

    /// Live statistics handle
    pub fn stats(&self) -> SharedStats {
        Arc::clone(&self.stats)
    }

    /// Process one reading.
    ///
    /// Returns the dispatch outcome when this reading closed a window that had
    /// a best classification. Configuration-integrity faults are returned as
    /// errors; transient inference failures skip the reading.
    pub async fn process(
        &mut self,
        reading: SensorReading,
    ) -> Result<Option<DispatchOutcome>, PipelineError> {
        let now = Instant::now();
        let vector = self.normalizer.normalize(&reading)?;

        let flush = match self.classifier.predict(&vector) {
            Ok(result) => {
                debug!("Classified {} ({:.3})", result.label, result.confidence);
                self.stats.write().await.readings_processed += 1;
                metrics::counter!("driveledger_readings_processed_total").increment(1);
                self.window.observe(Observation { result, reading }, now)
            }
            Err(e) if !e.is_configuration_fault() => {
                warn!("Skipping reading: {}", e);
                self.stats.write().await.readings_skipped += 1;
                self.window.poll(now)
            }
            Err(e) => return Err(e.into()),
        };

        self.stats.write().await.empty_windows = self.window.stats().empty;

        match flush {
            Some(flush) => Ok(Some(self.flush(flush).await)),
            None => Ok(None),
        }
    }

    async fn flush(&mut self, flush: WindowFlush<Observation>) -> DispatchOutcome {
        let best = flush.best;
        info!(
            "Window closed after {:?}: best {} ({:.2}%) of {} readings",
            flush.closed_at.saturating_duration_since(flush.opened_at),
            best.result.label,
            best.result.confidence * 100.0,
            flush.observed
        );
        metrics::counter!("driveledger_windows_flushed_total").increment(1);

        let outcome = self.dispatcher.dispatch(&best.result, &best.reading).await;

        let mut stats = self.stats.write().await;
        stats.windows_flushed += 1;
        stats.record_outcome(&outcome);
        outcome
    }

    /// Run until `cancel` fires or a configuration-integrity fault occurs.
    ///
    /// The window restarts when the loop starts. A best classification still
    /// pending at shutdown is discarded, never half-dispatched.
    pub async fn run<S>(
        &mut self,
        source: &mut S,
        cancel: CancellationToken,
    ) -> Result<PipelineStats, PipelineError>
    where
        S: TelemetrySource + ?Sized,
    {
        info!("Processing telemetry from {}", source.source_name());
        if let Some(stale) = self.window.restart(Instant::now()) {
            debug!("Dropping best {} from before the loop started", stale.result.label);
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let reading = tokio::select! {
                _ = cancel.cancelled() => break,
                reading = source.next() => reading,
            };

            self.process(reading).await?;
        }

        info!("Shutdown signal received");
        if let Some(pending) = self.window.discard() {
            info!(
                "Discarding pending window best {} ({:.2}%)",
                pending.result.label,
                pending.result.confidence * 100.0
            );
        }

        let stats = self.stats.read().await.clone();
        info!(
            "Pipeline stopped: {} readings, {} windows, {} attestations persisted, {} dropped",
            stats.readings_processed,
            stats.windows_flushed,
            stats.attestations_persisted,
            stats.attestations_dropped
        );
        Ok(stats)
    }
}
