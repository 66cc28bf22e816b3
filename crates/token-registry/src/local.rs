//! Local Token Registry
//!
//! The local registry is the final uniqueness authority: `try_record` is an
//! atomic check-and-append that succeeds for exactly one caller per id.

use crate::{RegistryError, TokenId};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Durable set of issued identifiers
#[async_trait]
pub trait LocalRegistry: Send + Sync {
    /// Whether `id` has been issued
    async fn contains(&self, id: TokenId) -> Result<bool, RegistryError>;

    /// Record `id` if absent. Returns `false` when it was already present.
    async fn try_record(&self, id: TokenId) -> Result<bool, RegistryError>;

    /// Number of recorded identifiers
    async fn len(&self) -> Result<u64, RegistryError>;
}

/// In-memory registry (not durable across restarts)
#[derive(Default)]
pub struct MemoryRegistry {
    issued: Mutex<HashSet<TokenId>>,
}

impl MemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        info!("Creating in-memory token registry");
        Self::default()
    }

    /// Create a registry pre-filled with `ids`
    pub fn with_ids(ids: impl IntoIterator<Item = TokenId>) -> Self {
        Self {
            issued: Mutex::new(ids.into_iter().collect()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashSet<TokenId>>, RegistryError> {
        self.issued
            .lock()
            .map_err(|e| RegistryError::DatabaseError(format!("Lock error: {}", e)))
    }
}

#[async_trait]
impl LocalRegistry for MemoryRegistry {
    async fn contains(&self, id: TokenId) -> Result<bool, RegistryError> {
        Ok(self.lock()?.contains(&id))
    }

    async fn try_record(&self, id: TokenId) -> Result<bool, RegistryError> {
        Ok(self.lock()?.insert(id))
    }

    async fn len(&self) -> Result<u64, RegistryError> {
        Ok(self.lock()?.len() as u64)
    }
}

/// SQLite-backed registry.
///
/// Ids are stored bit-cast to `INTEGER` under a primary key, so the insert
/// itself rejects duplicates even across processes sharing the file.
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    /// Open (or create) a registry database file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        info!("Opening token registry at {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::migrate(pool).await
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> Result<Self, RegistryError> {
        // A single connection keeps every query on the same memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, RegistryError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS issued_tokens (
                token_id INTEGER PRIMARY KEY,
                issued_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl LocalRegistry for SqliteRegistry {
    async fn contains(&self, id: TokenId) -> Result<bool, RegistryError> {
        let row: Option<i64> =
            sqlx::query_scalar("SELECT token_id FROM issued_tokens WHERE token_id = ?")
                .bind(id as i64)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn try_record(&self, id: TokenId) -> Result<bool, RegistryError> {
        let result = sqlx::query(
            "INSERT INTO issued_tokens (token_id, issued_at) VALUES (?, ?)
             ON CONFLICT(token_id) DO NOTHING",
        )
        .bind(id as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        debug!("Record token {}: inserted={}", id, inserted);
        Ok(inserted)
    }

    async fn len(&self) -> Result<u64, RegistryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issued_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
