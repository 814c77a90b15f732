//! Failure monitor configuration

use crate::error::{MonitorError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted status window (10 years)
pub const MAX_STATUS_WINDOW_HOURS: u32 = 87_600;

/// Longest accepted metrics window (10 years)
pub const MAX_METRICS_WINDOW_DAYS: u32 = 3_650;

/// Windows and thresholds used to summarize and classify integrations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Trailing window for status and health, in hours
    pub status_window_hours: u32,

    /// Trailing window for per-day metrics, in days
    pub metrics_window_days: u32,

    /// Success rate (percent) at or above which an integration is healthy
    pub healthy_threshold: f64,

    /// Success rate (percent) at or above which an integration is degraded
    pub degraded_threshold: f64,

    /// Attempt count below which the integration is flagged as under-exercised
    pub min_volume: u64,

    /// Maximum records the background writer appends in one batch
    pub batch_size: usize,

    /// Seconds between health sweeps of the watcher
    pub watch_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            status_window_hours: 24,
            metrics_window_days: 7,
            healthy_threshold: 95.0,
            degraded_threshold: 80.0,
            min_volume: 100,
            batch_size: 64,
            watch_interval_secs: 300,
        }
    }
}

impl MonitorConfig {
    pub fn status_window(&self) -> Duration {
        Duration::hours(i64::from(self.status_window_hours))
    }

    pub fn metrics_window(&self) -> Duration {
        Duration::days(i64::from(self.metrics_window_days))
    }

    pub fn watch_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.watch_interval_secs)
    }

    /// Validate window sizes and threshold ordering
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_STATUS_WINDOW_HOURS).contains(&self.status_window_hours) {
            return Err(MonitorError::Config(format!(
                "status_window_hours must be between 1 and {}, got {}",
                MAX_STATUS_WINDOW_HOURS, self.status_window_hours
            )));
        }

        if !(1..=MAX_METRICS_WINDOW_DAYS).contains(&self.metrics_window_days) {
            return Err(MonitorError::Config(format!(
                "metrics_window_days must be between 1 and {}, got {}",
                MAX_METRICS_WINDOW_DAYS, self.metrics_window_days
            )));
        }

        for (name, value) in [
            ("healthy_threshold", self.healthy_threshold),
            ("degraded_threshold", self.degraded_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(MonitorError::Config(format!(
                    "{} must be between 0 and 100, got {}",
                    name, value
                )));
            }
        }

        if self.degraded_threshold > self.healthy_threshold {
            return Err(MonitorError::Config(format!(
                "degraded_threshold ({}) must not exceed healthy_threshold ({})",
                self.degraded_threshold, self.healthy_threshold
            )));
        }

        if self.batch_size == 0 {
            return Err(MonitorError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if self.watch_interval_secs == 0 {
            return Err(MonitorError::Config(
                "watch_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Start of the trailing `window` ending at `now`
pub fn window_start(now: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(window).ok_or_else(|| {
        MonitorError::Config(format!(
            "a {} window ending at {} starts before the earliest supported time",
            window, now
        ))
    })
}
