//! Remote Token Registry
//!
//! The remote registry lists identifiers already used by any issuer. It may
//! be stale; it only pre-filters candidates before the local atomic record.

use crate::{RegistryError, TokenId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// Source of globally used identifiers
#[async_trait]
pub trait RemoteRegistry: Send + Sync {
    /// Identifiers known to be in use
    async fn list_used_ids(&self) -> Result<HashSet<TokenId>, RegistryError>;
}

/// Remote registry connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteRegistryConfig {
    /// Base URL of the REST endpoint (e.g. `https://xyz.supabase.co`); remote checks disabled when unset
    pub url: Option<String>,
    /// API key sent as `apikey` and bearer token
    pub api_key: Option<String>,
    /// Table holding attestation rows
    pub table: String,
    /// Column holding token ids
    pub id_column: String,
    /// HTTP request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RemoteRegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: "car_data".to_string(),
            id_column: "unique_id".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// PostgREST-style HTTP registry: `GET {url}/rest/v1/{table}?select={id_column}`
pub struct HttpRemoteRegistry {
    client: reqwest::Client,
    endpoint: String,
    id_column: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpRemoteRegistry {
    /// Create a registry client for the REST endpoint at `url`
    pub fn new(url: &str, config: &RemoteRegistryConfig) -> Result<Self, RegistryError> {
        if url.is_empty() {
            return Err(RegistryError::Unreachable("empty registry url".to_string()));
        }
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Unreachable(e.to_string()))?;

        let endpoint = format!(
            "{}/rest/v1/{}?select={}",
            url.trim_end_matches('/'),
            config.table,
            config.id_column
        );
        info!("Remote token registry: {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            id_column: config.id_column.clone(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl RemoteRegistry for HttpRemoteRegistry {
    async fn list_used_ids(&self) -> Result<HashSet<TokenId>, RegistryError> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RegistryError::Timeout(self.timeout)
            } else {
                RegistryError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<serde_json::Map<String, serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| RegistryError::Malformed(e.to_string()))?;

        let ids = parse_ids(&rows, &self.id_column)?;
        debug!("Remote registry lists {} used ids", ids.len());
        Ok(ids)
    }
}

/// Extract ids from registry rows; ids may be JSON numbers or decimal strings
fn parse_ids(
    rows: &[serde_json::Map<String, serde_json::Value>],
    column: &str,
) -> Result<HashSet<TokenId>, RegistryError> {
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter(|value| !value.is_null())
        .map(|value| match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| RegistryError::Malformed(format!("id {} is not a u64", n))),
            serde_json::Value::String(s) => s
                .parse::<TokenId>()
                .map_err(|_| RegistryError::Malformed(format!("id {:?} is not a u64", s))),
            other => Err(RegistryError::Malformed(format!("unexpected id value {}", other))),
        })
        .collect()
}
