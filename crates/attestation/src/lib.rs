//! Attestation
//!
//! Turns a window's best classification into a permanently unique record:
//! - Token issuance through the identifier issuer
//! - Persistence with bounded retry and backoff
//! - Fire-and-forget mint trigger after persistence

mod dispatcher;
mod mint;
mod record;
mod sink;

pub use dispatcher::{AttestationDispatcher, DispatchOutcome};
pub use mint::{MintConfig, MintTrigger, MqttMintTrigger};
pub use record::AttestationRecord;
pub use sink::{AttestationSink, HttpSink, LogSink, SinkConfig};

use resilience::RetryableError;
use std::time::Duration;
use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// May succeed if retried
    #[error("Transient I/O failure: {0}")]
    TransientIo(String),

    /// The sink refused the record; retrying cannot help
    #[error("Record rejected: {0}")]
    PermanentRejection(String),

    #[error("Sink timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RetryableError for SinkError {
    fn is_transient(&self) -> bool {
        matches!(self, SinkError::TransientIo(_) | SinkError::Timeout(_))
    }

    fn timed_out(after: Duration) -> Self {
        SinkError::Timeout(after)
    }
}

/// Mint trigger errors
#[derive(Error, Debug)]
pub enum MintError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
