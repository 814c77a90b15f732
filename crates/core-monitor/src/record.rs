//! Attempt records: the append-only log entries of the failure monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single attempt to call an integration.
///
/// Records are never mutated or deleted once appended; retention is an
/// external policy of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub integration_id: String,
    pub success: bool,
    /// Rendered error of a failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AttemptRecord {
    /// A record stamped with the current time
    pub fn new(integration_id: impl Into<String>, success: bool, error: Option<String>) -> Self {
        Self {
            integration_id: integration_id.into(),
            success,
            error,
            timestamp: Utc::now(),
        }
    }

    /// A successful attempt stamped now
    pub fn success(integration_id: impl Into<String>) -> Self {
        Self::new(integration_id, true, None)
    }

    /// A failed attempt stamped now
    pub fn failure(integration_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(integration_id, false, Some(error.into()))
    }

    /// Replace the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
