//! SQLite backend implementation
//!
//! Provides persistent storage using SQLite with WAL mode so that concurrent
//! appends from many integrations do not block readers. Timestamps are stored
//! as Unix milliseconds; the `(integration_id, timestamp_ms)` index serves the
//! windowed range queries.

use crate::error::{MonitorError, Result};
use crate::record::AttemptRecord;
use crate::store::AttemptStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    integration_id TEXT NOT NULL,
    success INTEGER NOT NULL,
    error TEXT,
    timestamp_ms INTEGER NOT NULL
)";

const CREATE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_attempts_integration_time
    ON attempts (integration_id, timestamp_ms)";

/// SQLite-backed attempt log
#[derive(Debug, Clone)]
pub struct SqliteAttemptStore {
    pool: SqlitePool,
}

impl SqliteAttemptStore {
    /// Open or create a SQLite attempt log at the specified path
    ///
    /// Creates the schema if it does not exist yet.
    pub async fn open(path: &str) -> Result<Self> {
        let db_url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite://{}", path)
        };

        let options = SqliteConnectOptions::from_str(&db_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Open a private in-memory database (single connection, lost on drop)
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_INDEX).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Get the underlying pool (for advanced usage)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// Helper to convert SqliteRow to AttemptRecord
fn row_to_record(row: &SqliteRow) -> Result<AttemptRecord> {
    let timestamp_ms: i64 = row.try_get("timestamp_ms")?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
        MonitorError::Store(format!("timestamp out of range: {}", timestamp_ms))
    })?;

    Ok(AttemptRecord {
        integration_id: row.try_get("integration_id")?,
        success: row.try_get::<i64, _>("success")? != 0,
        error: row.try_get("error")?,
        timestamp,
    })
}

#[async_trait]
impl AttemptStore for SqliteAttemptStore {
    async fn append(&self, record: &AttemptRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO attempts (integration_id, success, error, timestamp_ms) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.integration_id)
        .bind(record.success as i64)
        .bind(&record.error)
        .bind(record.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_batch(&self, records: &[AttemptRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                "INSERT INTO attempts (integration_id, success, error, timestamp_ms) VALUES (?, ?, ?, ?)",
            )
            .bind(&record.integration_id)
            .bind(record.success as i64)
            .bind(&record.error)
            .bind(record.timestamp.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn records_since(
        &self,
        integration_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttemptRecord>> {
        let rows = sqlx::query(
            "SELECT integration_id, success, error, timestamp_ms FROM attempts
             WHERE integration_id = ? AND timestamp_ms >= ?
             ORDER BY timestamp_ms DESC, id DESC",
        )
        .bind(integration_id)
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn integrations_since(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT integration_id FROM attempts
             WHERE timestamp_ms >= ?
             ORDER BY integration_id ASC",
        )
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("integration_id").map_err(MonitorError::from))
            .collect()
    }
}
