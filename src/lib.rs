/*!
 * Tether - resilience core for third-party integration calls
 *
 * Decides whether, when and how often to call an unreliable integration
 * platform (LMS, classroom, OAuth providers) and reports how each one is doing:
 * - Per-integration circuit breakers with single-trial half-open probing
 * - Bounded retries with capped exponential backoff, gated on every attempt
 * - Durable attempt log with rolling status, per-day metrics and health classes
 * - TOML configuration with per-integration overrides
 *
 * Author: Shane Wall <shaneawall@gmail.com>
 */

pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod output;

// Re-export commonly used types
pub use config::{IntegrationOverrides, LogLevel, TetherConfig};
pub use error::{Result, TetherError};
pub use guard::IntegrationGuard;

pub use tether_core_monitor as monitor;
pub use tether_core_resilience as resilience;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
