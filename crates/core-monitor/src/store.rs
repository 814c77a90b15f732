//! Attempt log storage
//!
//! The [`AttemptStore`] trait is the durable, append-only log consumed by the
//! failure monitor. Implementations must accept concurrent appends from many
//! integrations and answer windowed range queries ordered by timestamp.

use crate::error::Result;
use crate::record::AttemptRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Core trait for attempt log backends
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Append a single record
    async fn append(&self, record: &AttemptRecord) -> Result<()>;

    /// Append several records; backends should make this a single write when they can
    async fn append_batch(&self, records: &[AttemptRecord]) -> Result<()> {
        for record in records {
            self.append(record).await?;
        }
        Ok(())
    }

    /// Records for one integration with `timestamp >= since`, most recent first.
    ///
    /// Ordering follows the record timestamps, not the order they were appended.
    async fn records_since(
        &self,
        integration_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttemptRecord>>;

    /// Distinct integration ids with at least one record at or after `since`, sorted
    async fn integrations_since(&self, since: DateTime<Utc>) -> Result<Vec<String>>;
}

/// In-memory attempt log, used when no database is configured and in tests
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    /// Per-integration records, kept sorted by timestamp (oldest first)
    records: RwLock<HashMap<String, Vec<AttemptRecord>>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all integrations
    pub async fn len(&self) -> usize {
        self.records.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn insert_sorted(log: &mut Vec<AttemptRecord>, record: AttemptRecord) {
        // Equal timestamps keep append order
        let at = log.partition_point(|r| r.timestamp <= record.timestamp);
        log.insert(at, record);
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn append(&self, record: &AttemptRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let log = records.entry(record.integration_id.clone()).or_default();
        Self::insert_sorted(log, record.clone());
        Ok(())
    }

    async fn append_batch(&self, batch: &[AttemptRecord]) -> Result<()> {
        let mut records = self.records.write().await;
        for record in batch {
            let log = records.entry(record.integration_id.clone()).or_default();
            Self::insert_sorted(log, record.clone());
        }
        Ok(())
    }

    async fn records_since(
        &self,
        integration_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttemptRecord>> {
        let records = self.records.read().await;
        let Some(log) = records.get(integration_id) else {
            return Ok(Vec::new());
        };

        let start = log.partition_point(|r| r.timestamp < since);
        Ok(log[start..].iter().rev().cloned().collect())
    }

    async fn integrations_since(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let ids: BTreeSet<String> = records
            .iter()
            .filter(|(_, log)| log.last().is_some_and(|r| r.timestamp >= since))
            .map(|(id, _)| id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_records_since_is_most_recent_first() {
        let store = MemoryAttemptStore::new();
        let now = Utc::now();

        // Appended out of temporal order
        store
            .append(&AttemptRecord::success("canvas").at(now - Duration::minutes(1)))
            .await
            .unwrap();
        store
            .append(&AttemptRecord::failure("canvas", "503").at(now))
            .await
            .unwrap();
        store
            .append(&AttemptRecord::success("canvas").at(now - Duration::minutes(5)))
            .await
            .unwrap();

        let records = store
            .records_since("canvas", now - Duration::hours(1))
            .await
            .unwrap();
        let stamps: Vec<_> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(
            stamps,
            vec![now, now - Duration::minutes(1), now - Duration::minutes(5)]
        );
    }

    #[tokio::test]
    async fn test_window_excludes_older_records() {
        let store = MemoryAttemptStore::new();
        let now = Utc::now();
        store
            .append_batch(&[
                AttemptRecord::success("canvas").at(now - Duration::hours(25)),
                AttemptRecord::success("canvas").at(now - Duration::hours(23)),
            ])
            .await
            .unwrap();

        let records = store
            .records_since("canvas", now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(store.len().await, 2);
        assert!(store
            .records_since("unknown", now - Duration::hours(24))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_integrations_since() {
        let store = MemoryAttemptStore::new();
        let now = Utc::now();
        store
            .append_batch(&[
                AttemptRecord::success("zoom").at(now),
                AttemptRecord::success("canvas").at(now),
                AttemptRecord::success("legacy-sis").at(now - Duration::days(30)),
            ])
            .await
            .unwrap();

        let ids = store
            .integrations_since(now - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(ids, vec!["canvas", "zoom"]);
    }
}
