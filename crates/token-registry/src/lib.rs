//! Token Registry
//!
//! Issues token identifiers that are never reused: across restarts (the
//! local registry is durable), and across issuers (the remote registry is
//! consulted before each issuance).

mod issuer;
mod local;
mod remote;

pub use issuer::{IdSpace, IdentifierIssuer, IssuerConfig};
pub use local::{LocalRegistry, MemoryRegistry, SqliteRegistry};
pub use remote::{HttpRemoteRegistry, RemoteRegistry, RemoteRegistryConfig};

use resilience::RetryableError;
use std::time::Duration;
use thiserror::Error;

/// Token identifier
pub type TokenId = u64;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Remote registry unreachable: {0}")]
    Unreachable(String),
    #[error("Remote registry timed out after {0:?}")]
    Timeout(Duration),
    #[error("Remote registry returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed registry response: {0}")]
    Malformed(String),
}

impl RetryableError for RegistryError {
    fn is_transient(&self) -> bool {
        match self {
            RegistryError::Unreachable(_) | RegistryError::Timeout(_) => true,
            RegistryError::Status { status, .. } => *status >= 500 || *status == 429,
            RegistryError::DatabaseError(_) | RegistryError::Malformed(_) => false,
        }
    }

    fn timed_out(after: Duration) -> Self {
        RegistryError::Timeout(after)
    }
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        RegistryError::DatabaseError(err.to_string())
    }
}

/// Issuance errors
#[derive(Debug, Error)]
pub enum IssueError {
    /// Every draw hit an identifier already in use
    #[error("Identifier space exhausted after {draws} rejected draws")]
    Exhausted { draws: u64 },
    /// Remote registry could not be queried within the retry budget
    #[error("Remote registry unavailable: {0}")]
    RemoteUnavailable(RegistryError),
    /// Local registry failed to record the identifier
    #[error("Local registry failure: {0}")]
    Local(RegistryError),
}
