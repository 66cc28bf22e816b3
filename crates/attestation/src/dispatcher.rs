//! Attestation Dispatcher

use crate::{AttestationRecord, AttestationSink, MintTrigger};
use inference_engine::ClassificationResult;
use obd_telemetry::SensorReading;
use resilience::{retry, RetryPolicy};
use std::sync::Arc;
use token_registry::{IdentifierIssuer, TokenId};
use tracing::{error, info, warn};

/// Result of dispatching one window's best classification
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Record persisted under a freshly issued token
    Persisted {
        record: AttestationRecord,
        reference: String,
    },
    /// Attestation lost; the pipeline continues with the next window
    Dropped {
        /// Token issued before the failure, if any. It stays recorded and is
        /// never reissued.
        token_id: Option<TokenId>,
        reason: String,
    },
}

impl DispatchOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, DispatchOutcome::Persisted { .. })
    }
}

/// Issues a token, persists the record and triggers minting
pub struct AttestationDispatcher {
    issuer: Arc<IdentifierIssuer>,
    sink: Arc<dyn AttestationSink>,
    mint: Option<Arc<dyn MintTrigger>>,
    retry: RetryPolicy,
}

impl AttestationDispatcher {
    pub fn new(
        issuer: Arc<IdentifierIssuer>,
        sink: Arc<dyn AttestationSink>,
        mint: Option<Arc<dyn MintTrigger>>,
        retry: RetryPolicy,
    ) -> Self {
        info!(
            "Attestation dispatcher: sink={}, mint={}, max_attempts={}",
            sink.name(),
            mint.is_some(),
            retry.max_attempts
        );
        Self {
            issuer,
            sink,
            mint,
            retry,
        }
    }

    /// Attest `result`, classified from `reading`.
    ///
    /// The token is issued once; every persistence attempt reuses it.
    pub async fn dispatch(
        &self,
        result: &ClassificationResult,
        reading: &SensorReading,
    ) -> DispatchOutcome {
        let token_id = match self.issuer.issue().await {
            Ok(id) => id,
            Err(e) => {
                error!("Token issuance failed, dropping {} attestation: {}", result.label, e);
                return DispatchOutcome::Dropped {
                    token_id: None,
                    reason: e.to_string(),
                };
            }
        };

        let record = AttestationRecord::new(result, reading, token_id);
        let sink = &self.sink;
        let persisted = retry(&self.retry, "attestation persist", |_| sink.persist(&record)).await;

        let reference = match persisted {
            Ok(reference) => reference,
            Err(e) => {
                warn!("Attestation for token {} dropped: {}", token_id, e);
                return DispatchOutcome::Dropped {
                    token_id: Some(token_id),
                    reason: e.to_string(),
                };
            }
        };

        info!(
            "Attested {} ({:.2}%) as token {} -> {}",
            record.fault,
            record.confidence * 100.0,
            token_id,
            reference
        );

        if let Some(mint) = &self.mint {
            let mint = Arc::clone(mint);
            let reference = reference.clone();
            tokio::spawn(async move {
                match mint.mint(token_id, &reference).await {
                    Ok(receipt) => info!("Mint requested for token {}: {}", token_id, receipt),
                    Err(e) => warn!("Mint trigger failed for token {}: {}", token_id, e),
                }
            });
        }

        DispatchOutcome::Persisted { record, reference }
    }
}
