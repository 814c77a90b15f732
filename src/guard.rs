/*!
 * IntegrationGuard - the resilience core behind one handle
 *
 * Wires a circuit registry, a retry executor and a failure monitor together
 * from a `TetherConfig`:
 *
 * - `execute`: one gated attempt, recorded
 * - `with_retry`: bounded attempts, each gated and recorded
 * - circuit status / reset, integration status / metrics / health, sweep
 */

use std::future::Future;
use std::sync::Arc;
use tether_core_monitor::{
    AggregateHealthSummary, AttemptStore, FailureMonitor, HealthReport, IntegrationMetrics,
    IntegrationRegistry, IntegrationStatus, MemoryAttemptStore, RecentActivityRegistry,
    StaticRegistry,
};
use tether_core_resilience::{
    AttemptRecorder, CallError, CancellationToken, CircuitConfig, CircuitRegistry,
    CircuitSnapshot, RetryConfig, RetryExecutor,
};
use tracing::{debug, info};

use crate::config::TetherConfig;
use crate::error::{Result, TetherError};

/// Gate, retry and record calls to third-party integrations
#[derive(Debug, Clone)]
pub struct IntegrationGuard {
    circuits: CircuitRegistry,
    executor: RetryExecutor,
    monitor: FailureMonitor,
}

impl IntegrationGuard {
    /// Build from configuration, opening the attempt log it names.
    ///
    /// Integrations listed in `integrations` are the ones `monitor_all`
    /// sweeps; with none listed, every integration with attempts inside the
    /// metrics window is swept.
    pub async fn open(config: &TetherConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(config).await?;

        let registry: Arc<dyn IntegrationRegistry> = if config.integrations.is_empty() {
            Arc::new(RecentActivityRegistry::new(
                store.clone(),
                config.monitor.metrics_window(),
            ))
        } else {
            Arc::new(StaticRegistry::new(config.integrations.iter().cloned()))
        };

        Self::with_parts(config, store, registry)
    }

    /// Build around an existing store and integration registry
    pub fn with_parts(
        config: &TetherConfig,
        store: Arc<dyn AttemptStore>,
        registry: Arc<dyn IntegrationRegistry>,
    ) -> Result<Self> {
        config.validate()?;

        let monitor = FailureMonitor::new(store, registry, config.monitor.clone())?;
        let circuits = CircuitRegistry::new(config.circuit.clone())
            .with_overrides(config.circuit_overrides());
        let executor = RetryExecutor::new(
            circuits.clone(),
            Arc::new(monitor.clone()),
            config.retry.clone(),
        )
        .with_overrides(config.retry_overrides());

        debug!(
            failure_threshold = config.circuit.failure_threshold,
            max_attempts = config.retry.max_attempts,
            overrides = config.overrides.len(),
            "Integration guard ready"
        );

        Ok(Self {
            circuits,
            executor,
            monitor,
        })
    }

    /// Run a single gated attempt of `op`.
    ///
    /// `config` replaces the integration's circuit settings for this call.
    /// When the circuit is open the operation is never invoked and nothing is
    /// recorded; otherwise the outcome is recorded on the circuit and in the
    /// attempt log.
    pub async fn execute<F, Fut, T, E>(
        &self,
        integration_id: &str,
        config: Option<&CircuitConfig>,
        op: F,
    ) -> std::result::Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        if let Some(config) = config {
            config.validate()?;
        }
        let permit = self.circuits.acquire(integration_id, config)?;

        match op().await {
            Ok(value) => {
                permit.record_success();
                self.monitor.record_attempt(integration_id, true, None);
                Ok(value)
            }
            Err(e) => {
                permit.record_failure();
                self.monitor
                    .record_attempt(integration_id, false, Some(e.to_string()));
                Err(CallError::Operation(e))
            }
        }
    }

    /// Retry `op` with backoff, gating every attempt through the circuit.
    ///
    /// `config` replaces the integration's retry settings for this call.
    pub async fn with_retry<F, Fut, T, E>(
        &self,
        integration_id: &str,
        config: Option<&RetryConfig>,
        op: F,
    ) -> std::result::Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        match config {
            Some(config) => self.executor.with_retry_config(integration_id, config, op).await,
            None => self.executor.with_retry(integration_id, op).await,
        }
    }

    /// Like [`with_retry`](Self::with_retry), stopping as soon as `cancel` fires
    pub async fn with_retry_cancellable<F, Fut, T, E>(
        &self,
        integration_id: &str,
        config: Option<&RetryConfig>,
        cancel: &CancellationToken,
        op: F,
    ) -> std::result::Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let config = match config {
            Some(config) => config.clone(),
            None => self.executor.config_for(integration_id),
        };
        self.executor
            .with_retry_cancellable(integration_id, &config, cancel, op)
            .await
    }

    /// Read-only circuit snapshot; never creates a circuit
    pub fn circuit_status(&self, integration_id: &str) -> CircuitSnapshot {
        self.circuits.status(integration_id)
    }

    /// Snapshots of every circuit this process has used
    pub fn circuit_snapshots(&self) -> Vec<CircuitSnapshot> {
        self.circuits.snapshot_all()
    }

    /// Force a circuit closed. Idempotent.
    pub fn reset_circuit(&self, integration_id: &str) {
        self.circuits.reset(integration_id);
        info!(integration_id, "Circuit reset");
    }

    pub async fn integration_status(&self, integration_id: &str) -> Result<IntegrationStatus> {
        Ok(self.monitor.get_status(integration_id).await?)
    }

    pub async fn integration_metrics(&self, integration_id: &str) -> Result<IntegrationMetrics> {
        Ok(self.monitor.get_metrics(integration_id).await?)
    }

    pub async fn check_health(&self, integration_id: &str) -> Result<HealthReport> {
        Ok(self.monitor.check_health(integration_id).await?)
    }

    pub async fn monitor_all(&self) -> Result<AggregateHealthSummary> {
        Ok(self.monitor.monitor_all().await?)
    }

    /// Wait until every recorded attempt has reached the attempt log
    pub async fn flush(&self) -> Result<()> {
        Ok(self.monitor.flush().await?)
    }

    /// Persist queued attempts and stop the attempt writer
    pub async fn shutdown(&self) -> Result<()> {
        Ok(self.monitor.shutdown().await?)
    }

    pub fn circuits(&self) -> &CircuitRegistry {
        &self.circuits
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    pub fn monitor(&self) -> &FailureMonitor {
        &self.monitor
    }
}

/// Open the attempt store the configuration names
async fn open_store(config: &TetherConfig) -> Result<Arc<dyn AttemptStore>> {
    match &config.database_path {
        None => {
            debug!("No database_path configured, attempt log is in-memory");
            Ok(Arc::new(MemoryAttemptStore::new()))
        }
        Some(path) => open_sqlite(path).await,
    }
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(path: &std::path::Path) -> Result<Arc<dyn AttemptStore>> {
    let path_str = path.to_str().ok_or_else(|| {
        TetherError::Config(format!("database_path is not valid UTF-8: {}", path.display()))
    })?;
    let store = tether_core_monitor::SqliteAttemptStore::open(path_str).await?;
    info!(path = %path.display(), "Attempt log opened");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(path: &std::path::Path) -> Result<Arc<dyn AttemptStore>> {
    Err(TetherError::Config(format!(
        "database_path {} requires the 'sqlite' feature",
        path.display()
    )))
}
