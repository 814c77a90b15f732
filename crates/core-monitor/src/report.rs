//! Derived reports: rolling status, per-day metrics and health classification
//!
//! Everything here is computed from a window of [`AttemptRecord`]s on each
//! query and never stored. The functions are pure so the arithmetic can be
//! tested without a store or a clock.

use crate::config::MonitorConfig;
use crate::record::AttemptRecord;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Rolling status of one integration over the status window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationStatus {
    pub integration_id: String,
    pub total_attempts: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Percentage in `0.0..=100.0`; 0 when there were no attempts
    pub success_rate: f64,
    pub last_attempt: Option<DateTime<Utc>>,
    /// Error of the most recent failed attempt
    pub last_error: Option<String>,
}

/// Attempts falling on one UTC calendar day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// Errors of the day's failed attempts, most recent first
    pub errors: Vec<String>,
}

/// Per-day breakdown of one integration over the metrics window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationMetrics {
    pub integration_id: String,
    pub window_days: u32,
    pub total_attempts: u64,
    pub success_rate: f64,
    pub daily: BTreeMap<NaiveDate, DailyMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthLevel::Healthy => write!(f, "healthy"),
            HealthLevel::Degraded => write!(f, "degraded"),
            HealthLevel::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Operator guidance attached to a health report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Success rate is below the healthy threshold
    InvestigateErrors,
    /// At least one attempt failed in the window
    EnsureProtection,
    /// Fewer attempts than the configured minimum volume
    VerifyTraffic,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::InvestigateErrors => write!(f, "investigate error patterns"),
            Recommendation::EnsureProtection => {
                write!(f, "ensure retry/circuit-breaker protection is active")
            }
            Recommendation::VerifyTraffic => {
                write!(f, "verify integration is actually being exercised")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub integration_id: String,
    pub health: HealthLevel,
    pub status: IntegrationStatus,
    pub recommendations: Vec<Recommendation>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.health == HealthLevel::Healthy
    }
}

/// An integration whose health could not be determined during a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCheck {
    pub integration_id: String,
    pub error: String,
}

/// Result of sweeping every active integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateHealthSummary {
    pub checked_at: DateTime<Utc>,
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub integrations: Vec<HealthReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedCheck>,
}

impl AggregateHealthSummary {
    /// Tally a set of reports
    pub fn from_reports(
        checked_at: DateTime<Utc>,
        integrations: Vec<HealthReport>,
        failed: Vec<FailedCheck>,
    ) -> Self {
        let count = |level| integrations.iter().filter(|r| r.health == level).count();
        Self {
            checked_at,
            total: integrations.len(),
            healthy: count(HealthLevel::Healthy),
            degraded: count(HealthLevel::Degraded),
            unhealthy: count(HealthLevel::Unhealthy),
            integrations,
            failed,
        }
    }

    /// True when every integration was checked and all are healthy
    pub fn all_healthy(&self) -> bool {
        self.failed.is_empty() && self.healthy == self.total
    }
}

/// Percentage of successes; 0 when there were no attempts
pub fn success_rate(successes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    // Multiply first so integral percentages compare exactly against thresholds
    (successes as f64 * 100.0) / total as f64
}

/// Summarize a window of records given most recent first
pub fn summarize(integration_id: &str, records: &[AttemptRecord]) -> IntegrationStatus {
    let total = records.len() as u64;
    let successes = records.iter().filter(|r| r.success).count() as u64;

    IntegrationStatus {
        integration_id: integration_id.to_string(),
        total_attempts: total,
        success_count: successes,
        failure_count: total - successes,
        success_rate: success_rate(successes, total),
        last_attempt: records.first().map(|r| r.timestamp),
        last_error: records
            .iter()
            .find(|r| !r.success)
            .and_then(|r| r.error.clone()),
    }
}

/// Group a window of records (most recent first) by UTC calendar day
pub fn group_metrics(
    integration_id: &str,
    window_days: u32,
    records: &[AttemptRecord],
) -> IntegrationMetrics {
    let mut daily: BTreeMap<NaiveDate, DailyMetrics> = BTreeMap::new();
    let mut successes = 0u64;

    for record in records {
        let day = daily.entry(record.timestamp.date_naive()).or_default();
        day.attempts += 1;
        if record.success {
            day.successes += 1;
            successes += 1;
        } else {
            day.failures += 1;
            if let Some(error) = &record.error {
                day.errors.push(error.clone());
            }
        }
    }

    let total = records.len() as u64;
    IntegrationMetrics {
        integration_id: integration_id.to_string(),
        window_days,
        total_attempts: total,
        success_rate: success_rate(successes, total),
        daily,
    }
}

/// Classify a status and attach recommendations
pub fn classify(
    status: IntegrationStatus,
    config: &MonitorConfig,
    checked_at: DateTime<Utc>,
) -> HealthReport {
    let health = if status.success_rate >= config.healthy_threshold {
        HealthLevel::Healthy
    } else if status.success_rate >= config.degraded_threshold {
        HealthLevel::Degraded
    } else {
        HealthLevel::Unhealthy
    };

    let mut recommendations = Vec::new();
    if status.success_rate < config.healthy_threshold {
        recommendations.push(Recommendation::InvestigateErrors);
    }
    if status.failure_count > 0 {
        recommendations.push(Recommendation::EnsureProtection);
    }
    if status.total_attempts < config.min_volume {
        recommendations.push(Recommendation::VerifyTraffic);
    }

    HealthReport {
        integration_id: status.integration_id.clone(),
        health,
        status,
        recommendations,
        checked_at,
    }
}
