//! FailureMonitor: attempt logging and integration health
//!
//! Writes go through the [`AttemptWriter`] so that logging never blocks or
//! fails the caller; reads query the [`AttemptStore`] directly over a trailing
//! window. Reads may briefly miss records still queued in the writer; call
//! [`FailureMonitor::flush`] first when a read must observe everything logged.

use crate::config::{window_start, MonitorConfig};
use crate::error::{MonitorError, Result};
use crate::record::AttemptRecord;
use crate::registry::IntegrationRegistry;
use crate::report::{
    classify, group_metrics, summarize, AggregateHealthSummary, FailedCheck, HealthReport,
    IntegrationMetrics, IntegrationStatus,
};
use crate::store::AttemptStore;
use crate::writer::{AttemptWriter, WriterStats};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tether_core_resilience::AttemptRecorder;
use tracing::{debug, info, warn};

/// Durable attempt log plus rolling health analysis
#[derive(Clone)]
pub struct FailureMonitor {
    store: Arc<dyn AttemptStore>,
    writer: AttemptWriter,
    registry: Arc<dyn IntegrationRegistry>,
    config: Arc<MonitorConfig>,
}

impl std::fmt::Debug for FailureMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureMonitor")
            .field("writer", &self.writer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FailureMonitor {
    /// Create a monitor and spawn its background writer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        store: Arc<dyn AttemptStore>,
        registry: Arc<dyn IntegrationRegistry>,
        config: MonitorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let writer = AttemptWriter::spawn(store.clone(), config.batch_size)?;

        Ok(Self {
            store,
            writer,
            registry,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn AttemptStore> {
        &self.store
    }

    pub fn writer_stats(&self) -> &WriterStats {
        self.writer.stats()
    }

    /// Append an attempt stamped with the current time.
    ///
    /// Never fails: a closed writer is logged and the record dropped.
    pub fn log_attempt(&self, integration_id: &str, success: bool, error: Option<String>) {
        let record = AttemptRecord::new(integration_id, success, error);
        if let Err(e) = self.writer.log(record) {
            warn!(integration_id, error = %e, "Dropping attempt record");
        }
    }

    /// Wait until every attempt logged so far has reached the store
    pub async fn flush(&self) -> Result<()> {
        self.writer.flush().await
    }

    /// Persist queued attempts and stop the writer
    pub async fn shutdown(&self) -> Result<()> {
        self.writer.shutdown().await
    }

    /// Status over the trailing status window ending now
    pub async fn get_status(&self, integration_id: &str) -> Result<IntegrationStatus> {
        self.get_status_at(integration_id, Utc::now()).await
    }

    /// Status over the trailing status window ending at `now`
    pub async fn get_status_at(
        &self,
        integration_id: &str,
        now: DateTime<Utc>,
    ) -> Result<IntegrationStatus> {
        let since = window_start(now, self.config.status_window())?;
        let records = self.store.records_since(integration_id, since).await?;
        Ok(summarize(integration_id, &records))
    }

    /// Per-day metrics over the trailing metrics window ending now
    pub async fn get_metrics(&self, integration_id: &str) -> Result<IntegrationMetrics> {
        self.get_metrics_at(integration_id, Utc::now()).await
    }

    pub async fn get_metrics_at(
        &self,
        integration_id: &str,
        now: DateTime<Utc>,
    ) -> Result<IntegrationMetrics> {
        let since = window_start(now, self.config.metrics_window())?;
        let records = self.store.records_since(integration_id, since).await?;
        Ok(group_metrics(
            integration_id,
            self.config.metrics_window_days,
            &records,
        ))
    }

    /// Classify an integration from its current status
    pub async fn check_health(&self, integration_id: &str) -> Result<HealthReport> {
        self.check_health_at(integration_id, Utc::now()).await
    }

    pub async fn check_health_at(
        &self,
        integration_id: &str,
        now: DateTime<Utc>,
    ) -> Result<HealthReport> {
        let status = self.get_status_at(integration_id, now).await?;
        let report = classify(status, &self.config, now);
        debug!(
            integration_id,
            health = %report.health,
            success_rate = report.status.success_rate,
            "Integration health checked"
        );
        Ok(report)
    }

    /// Check every active integration concurrently
    pub async fn monitor_all(&self) -> Result<AggregateHealthSummary> {
        self.monitor_all_at(Utc::now()).await
    }

    /// Check every active integration as of `now`.
    ///
    /// Fails only when the registry cannot list integrations; a failed check
    /// of one integration is reported in [`AggregateHealthSummary::failed`].
    pub async fn monitor_all_at(&self, now: DateTime<Utc>) -> Result<AggregateHealthSummary> {
        let ids = self
            .registry
            .active_integrations()
            .await
            .map_err(|e| match e {
                MonitorError::Registry(msg) => MonitorError::Registry(msg),
                other => MonitorError::Registry(other.to_string()),
            })?;

        let checks = ids.iter().map(|id| self.check_health_at(id, now));
        let results = join_all(checks).await;

        let mut reports = Vec::with_capacity(ids.len());
        let mut failed = Vec::new();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(integration_id = %id, error = %e, "Health check failed");
                    failed.push(FailedCheck {
                        integration_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        let summary = AggregateHealthSummary::from_reports(now, reports, failed);
        info!(
            total = summary.total,
            healthy = summary.healthy,
            degraded = summary.degraded,
            unhealthy = summary.unhealthy,
            failed = summary.failed.len(),
            "Integration health sweep complete"
        );
        Ok(summary)
    }
}

impl AttemptRecorder for FailureMonitor {
    fn record_attempt(&self, integration_id: &str, success: bool, error: Option<String>) {
        self.log_attempt(integration_id, success, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;
    use crate::report::{HealthLevel, Recommendation};
    use crate::store::MemoryAttemptStore;
    use async_trait::async_trait;
    use chrono::Duration;

    struct DownRegistry;

    #[async_trait]
    impl IntegrationRegistry for DownRegistry {
        async fn active_integrations(&self) -> Result<Vec<String>> {
            Err(MonitorError::Store("registry table locked".to_string()))
        }
    }

    fn monitor_with(ids: &[&str]) -> (FailureMonitor, Arc<MemoryAttemptStore>) {
        let store = Arc::new(MemoryAttemptStore::new());
        let monitor = FailureMonitor::new(
            store.clone(),
            Arc::new(StaticRegistry::new(ids.iter().copied())),
            MonitorConfig::default(),
        )
        .unwrap();
        (monitor, store)
    }

    async fn seed(store: &MemoryAttemptStore, id: &str, successes: usize, failures: usize) {
        let now = Utc::now();
        let mut records = Vec::new();
        for i in 0..successes {
            records.push(AttemptRecord::success(id).at(now - Duration::seconds(i as i64 + 1)));
        }
        for i in 0..failures {
            records.push(
                AttemptRecord::failure(id, format!("error {}", i))
                    .at(now - Duration::seconds((successes + i) as i64 + 1)),
            );
        }
        store.append_batch(&records).await.unwrap();
    }

    #[tokio::test]
    async fn test_logged_attempts_feed_status() {
        let (monitor, _store) = monitor_with(&["canvas"]);

        monitor.log_attempt("canvas", true, None);
        monitor.log_attempt("canvas", true, None);
        monitor.log_attempt("canvas", false, Some("HTTP 429".to_string()));
        monitor.log_attempt("canvas", true, None);
        monitor.flush().await.unwrap();

        let status = monitor.get_status("canvas").await.unwrap();
        assert_eq!(status.total_attempts, 4);
        assert_eq!(status.success_rate, 75.0);
        assert_eq!(status.last_error.as_deref(), Some("HTTP 429"));
    }

    #[tokio::test]
    async fn test_status_window_is_24_hours() {
        let (monitor, store) = monitor_with(&[]);
        let now = Utc::now();
        store
            .append_batch(&[
                AttemptRecord::failure("canvas", "stale").at(now - Duration::hours(30)),
                AttemptRecord::success("canvas").at(now - Duration::hours(2)),
            ])
            .await
            .unwrap();

        let status = monitor.get_status_at("canvas", now).await.unwrap();
        assert_eq!(status.total_attempts, 1);
        assert_eq!(status.success_rate, 100.0);
        assert!(status.last_error.is_none());

        let metrics = monitor.get_metrics_at("canvas", now).await.unwrap();
        assert_eq!(metrics.total_attempts, 2);
        assert_eq!(metrics.window_days, 7);
    }

    #[tokio::test]
    async fn test_check_health_degraded() {
        let (monitor, store) = monitor_with(&["clever"]);
        seed(&store, "clever", 90, 10).await;

        let report = monitor.check_health("clever").await.unwrap();
        assert_eq!(report.health, HealthLevel::Degraded);
        assert_eq!(
            report.recommendations,
            vec![
                Recommendation::InvestigateErrors,
                Recommendation::EnsureProtection
            ]
        );
    }

    #[tokio::test]
    async fn test_monitor_all_counts() {
        let (monitor, store) = monitor_with(&["canvas", "clever", "schoology"]);
        seed(&store, "canvas", 100, 0).await;
        seed(&store, "clever", 85, 15).await;
        seed(&store, "schoology", 5, 5).await;

        let summary = monitor.monitor_all().await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.healthy, 1);
        assert_eq!(summary.degraded, 1);
        assert_eq!(summary.unhealthy, 1);
        assert_eq!(summary.integrations[0].integration_id, "canvas");
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn test_registry_failure_is_reported() {
        let monitor = FailureMonitor::new(
            Arc::new(MemoryAttemptStore::new()),
            Arc::new(DownRegistry),
            MonitorConfig::default(),
        )
        .unwrap();

        assert!(matches!(
            monitor.monitor_all().await,
            Err(MonitorError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn test_log_after_shutdown_is_silent() {
        let (monitor, store) = monitor_with(&["canvas"]);
        monitor.log_attempt("canvas", true, None);
        monitor.shutdown().await.unwrap();

        monitor.log_attempt("canvas", false, Some("late".to_string()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = FailureMonitor::new(
            Arc::new(MemoryAttemptStore::new()),
            Arc::new(StaticRegistry::default()),
            MonitorConfig {
                batch_size: 0,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }

    #[tokio::test]
    async fn test_oversized_window_is_an_error_not_a_panic() {
        let result = FailureMonitor::new(
            Arc::new(MemoryAttemptStore::new()),
            Arc::new(StaticRegistry::default()),
            MonitorConfig {
                metrics_window_days: 200_000_000,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(MonitorError::Config(_))));

        let (monitor, _store) = monitor_with(&["canvas"]);
        let earliest = DateTime::<Utc>::MIN_UTC;
        assert!(matches!(
            monitor.get_metrics_at("canvas", earliest).await,
            Err(MonitorError::Config(_))
        ));
        assert!(matches!(
            monitor.get_status_at("canvas", earliest).await,
            Err(MonitorError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_recorder_seam() {
        let (monitor, _store) = monitor_with(&["canvas"]);
        let recorder: Arc<dyn AttemptRecorder> = Arc::new(monitor.clone());

        recorder.record_attempt("canvas", false, Some("timeout".to_string()));
        monitor.flush().await.unwrap();

        let status = monitor.get_status("canvas").await.unwrap();
        assert_eq!(status.failure_count, 1);
    }
}
