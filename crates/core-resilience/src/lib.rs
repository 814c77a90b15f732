//! Tether Core Resilience: call gating for unreliable integrations
//!
//! # Overview
//!
//! This crate decides *whether*, *when* and *how often* to call a third-party
//! integration (classroom platforms, LMS APIs, OAuth providers). It includes:
//!
//! - **Circuit Registry**: one circuit breaker per integration id, created on demand
//! - **Retry Executor**: bounded attempts with capped exponential backoff, gated
//!   by the circuit on every attempt
//! - **Attempt Recorder**: the seam through which every attempt outcome is reported
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - How attempt outcomes are stored
//! - The network call being wrapped (it is a caller-supplied closure)
//! - Integration-specific payloads
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      Integration-facing code            │
//! └─────────────┬───────────────────────────┘
//!               │ with_retry(id, op)
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Retry Executor                    │  ← Bounded attempts + backoff
//! └─────────────┬───────────────────────────┘
//!               │ per attempt
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Registry                  │  ← Fail-fast gate per integration
//! └─────────────┬───────────────────────────┘
//!               │ admitted
//!               ▼
//!           op() ──────► outcome ──► circuit + AttemptRecorder
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether_core_resilience::{
//!     CallError, CircuitRegistry, NoopRecorder, RetryConfig, RetryExecutor,
//! };
//!
//! # async fn fetch_courses() -> Result<Vec<String>, std::io::Error> { Ok(vec![]) }
//! # async fn example() -> Result<(), CallError<std::io::Error>> {
//! let executor = RetryExecutor::new(
//!     CircuitRegistry::new_default(),
//!     Arc::new(NoopRecorder),
//!     RetryConfig::default(),
//! );
//!
//! let courses = executor.with_retry("google-classroom", fetch_courses).await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod recorder;
pub mod registry;
pub mod retry;

// Re-export main types for convenience
pub use backoff::BackoffSchedule;
pub use circuit_breaker::{CallPermit, Circuit, CircuitSnapshot, CircuitState};
pub use config::{CircuitConfig, CircuitOverrides, RetryConfig, RetryOverrides};
pub use error::{CallError, CircuitOpenError, ConfigError};
pub use recorder::{AttemptRecorder, NoopRecorder};
pub use registry::CircuitRegistry;
pub use retry::RetryExecutor;

pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use tether_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{CircuitSnapshot, CircuitState};
    pub use super::config::{CircuitConfig, RetryConfig};
    pub use super::error::{CallError, CircuitOpenError};
    pub use super::recorder::AttemptRecorder;
    pub use super::registry::CircuitRegistry;
    pub use super::retry::RetryExecutor;
}
