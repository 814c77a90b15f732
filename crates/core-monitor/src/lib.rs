//! Tether Core Monitor: attempt log and integration health
//!
//! # Overview
//!
//! This crate is the Failure Monitor half of Tether's resilience core. It:
//!
//! - keeps a durable, append-only log of every attempt made against an integration
//! - computes rolling status (24h), per-day metrics (7 days) and a health class
//! - sweeps every active integration on demand or on a schedule
//!
//! # Architecture
//!
//! ```text
//! RetryExecutor ──► AttemptRecorder ──► FailureMonitor::log_attempt
//!                                              │
//!                                              ▼
//!                                        AttemptWriter  (batched, off the hot path)
//!                                              │
//!                                              ▼
//!                      AttemptStore  (MemoryAttemptStore | SqliteAttemptStore)
//!                                              ▲
//!          get_status / get_metrics / check_health / monitor_all
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether_core_monitor::{
//!     FailureMonitor, MemoryAttemptStore, MonitorConfig, StaticRegistry,
//! };
//!
//! # async fn example() -> tether_core_monitor::Result<()> {
//! let monitor = FailureMonitor::new(
//!     Arc::new(MemoryAttemptStore::new()),
//!     Arc::new(StaticRegistry::new(["canvas", "google-classroom"])),
//!     MonitorConfig::default(),
//! )?;
//!
//! monitor.log_attempt("canvas", false, Some("HTTP 503".into()));
//! monitor.flush().await?;
//!
//! let report = monitor.check_health("canvas").await?;
//! println!("{}: {}", report.integration_id, report.health);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod monitor;
pub mod record;
pub mod registry;
pub mod report;
pub mod store;
pub mod watcher;
pub mod writer;

// Re-export main types for convenience
#[cfg(feature = "sqlite")]
pub use backends::sqlite::SqliteAttemptStore;
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use monitor::FailureMonitor;
pub use record::AttemptRecord;
pub use registry::{IntegrationRegistry, RecentActivityRegistry, StaticRegistry};
pub use report::{
    AggregateHealthSummary, DailyMetrics, FailedCheck, HealthLevel, HealthReport,
    IntegrationMetrics, IntegrationStatus, Recommendation,
};
pub use store::{AttemptStore, MemoryAttemptStore};
pub use watcher::HealthWatcher;
pub use writer::{AttemptWriter, WriterStats};

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::monitor::FailureMonitor;
    pub use super::record::AttemptRecord;
    pub use super::registry::IntegrationRegistry;
    pub use super::report::{HealthLevel, HealthReport, IntegrationStatus};
    pub use super::store::AttemptStore;
}
