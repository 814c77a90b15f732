//! HealthWatcher: periodic health sweeps of every active integration
//!
//! Runs `monitor_all` on a fixed interval and logs the outcome. Unhealthy
//! integrations are logged at `warn!`, degraded ones at `info!`. The loop
//! exits when its cancellation token fires.

use crate::monitor::FailureMonitor;
use crate::report::{AggregateHealthSummary, HealthLevel};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

type SweepCallback = Box<dyn Fn(&AggregateHealthSummary) + Send + Sync>;

pub struct HealthWatcher {
    monitor: FailureMonitor,
    interval: Duration,
    on_sweep: Option<SweepCallback>,
}

impl HealthWatcher {
    /// Create a watcher using the monitor's configured interval
    pub fn new(monitor: FailureMonitor) -> Self {
        let interval = monitor.config().watch_interval();
        Self {
            monitor,
            interval,
            on_sweep: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Invoke `callback` with the summary of every successful sweep
    pub fn on_sweep<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AggregateHealthSummary) + Send + Sync + 'static,
    {
        self.on_sweep = Some(Box::new(callback));
        self
    }

    /// Sweep immediately, then once per interval, until `cancel` fires.
    ///
    /// Returns the number of sweeps performed.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        info!(
            interval_secs = self.interval.as_secs(),
            "Health watcher active"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweeps = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.run_sweep().await;
                    sweeps += 1;
                }
            }
        }

        info!(sweeps, "Health watcher stopped");
        sweeps
    }

    /// Execute a single sweep
    pub async fn run_sweep(&self) -> Option<AggregateHealthSummary> {
        let summary = match self.monitor.monitor_all().await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "Health sweep failed");
                return None;
            }
        };

        for report in &summary.integrations {
            match report.health {
                HealthLevel::Healthy => {}
                HealthLevel::Degraded => info!(
                    integration_id = %report.integration_id,
                    success_rate = report.status.success_rate,
                    "Integration degraded"
                ),
                HealthLevel::Unhealthy => warn!(
                    integration_id = %report.integration_id,
                    success_rate = report.status.success_rate,
                    last_error = report.status.last_error.as_deref(),
                    "Integration unhealthy"
                ),
            }
        }

        if let Some(callback) = &self.on_sweep {
            callback(&summary);
        }

        Some(summary)
    }
}
