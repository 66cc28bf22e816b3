//! Attestation Sinks

use crate::{AttestationRecord, SinkError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Destination for attestation records
#[async_trait]
pub trait AttestationSink: Send + Sync {
    /// Persist `record`, returning an external reference to it
    async fn persist(&self, record: &AttestationRecord) -> Result<String, SinkError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// HTTP sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Base URL of the REST endpoint; log-only sink when unset
    pub url: Option<String>,
    /// API key sent as `apikey` and bearer token
    pub api_key: Option<String>,
    /// Destination table
    pub table: String,
    /// HTTP request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: "car_data".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// PostgREST-style sink: `POST {url}/rest/v1/{table}`
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
    table: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpSink {
    /// Create a sink posting to `url`
    pub fn new(url: &str, config: &SinkConfig) -> Result<Self, SinkError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::TransientIo(e.to_string()))?;

        let endpoint = format!("{}/rest/v1/{}", url.trim_end_matches('/'), config.table);
        info!("Attestation sink: {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            table: config.table.clone(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }
}

/// Map a non-success HTTP status to a sink error
fn status_error(status: u16, body: String) -> SinkError {
    if status >= 500 || status == 429 || status == 408 {
        SinkError::TransientIo(format!("HTTP {}: {}", status, body))
    } else {
        SinkError::PermanentRejection(format!("HTTP {}: {}", status, body))
    }
}

#[async_trait]
impl AttestationSink for HttpSink {
    async fn persist(&self, record: &AttestationRecord) -> Result<String, SinkError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Prefer", "return=minimal")
            .json(record);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SinkError::Timeout(self.timeout)
            } else {
                SinkError::TransientIo(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        debug!("Persisted token {} to {}", record.unique_id, self.endpoint);
        Ok(format!("{}/{}", self.table, record.unique_id))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Sink that only logs records; used when no endpoint is configured
#[derive(Default)]
pub struct LogSink {
    persisted: AtomicU64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records logged so far
    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AttestationSink for LogSink {
    async fn persist(&self, record: &AttestationRecord) -> Result<String, SinkError> {
        let payload =
            serde_json::to_string(record).map_err(|e| SinkError::Serialization(e.to_string()))?;
        info!("Attestation: {}", payload);

        self.persisted.fetch_add(1, Ordering::Relaxed);
        Ok(format!("log-{}", Uuid::new_v4()))
    }

    fn name(&self) -> &str {
        "log"
    }
}
