//! Circuit and retry configuration
//!
//! Both configs are plain structs with defaults. A per-integration
//! [`CircuitOverrides`] / [`RetryOverrides`] carries only the fields that differ
//! and is merged onto a base config with override-wins semantics.
//!
//! Durations serialize as integer milliseconds so they read naturally in TOML:
//!
//! ```toml
//! failure_threshold = 5
//! reset_timeout_ms = 60000
//! half_open_timeout_ms = 30000
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Consecutive failures (while closed) that open the circuit
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls before admitting a trial
    #[serde(rename = "reset_timeout_ms", with = "millis")]
    pub reset_timeout: Duration,

    /// How long a half-open trial may run before the circuit reopens
    #[serde(rename = "half_open_timeout_ms", with = "millis")]
    pub half_open_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        Ok(())
    }
}

/// Configuration for the retry loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    #[serde(rename = "initial_delay_ms", with = "millis")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,

    /// Multiplier applied per additional failed attempt
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// A config that makes exactly one attempt and never sleeps
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !(self.backoff_factor > 1.0) || !self.backoff_factor.is_finite() {
            return Err(ConfigError::BackoffFactor(self.backoff_factor.to_string()));
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::DelayOrder {
                initial: self.initial_delay,
                max: self.max_delay,
            });
        }
        Ok(())
    }
}

/// Partial circuit config; set fields win over the base config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,

    #[serde(
        rename = "reset_timeout_ms",
        with = "opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub reset_timeout: Option<Duration>,

    #[serde(
        rename = "half_open_timeout_ms",
        with = "opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub half_open_timeout: Option<Duration>,
}

impl CircuitOverrides {
    /// Merge onto `base`, returning the effective config
    pub fn apply(&self, base: &CircuitConfig) -> CircuitConfig {
        CircuitConfig {
            failure_threshold: self.failure_threshold.unwrap_or(base.failure_threshold),
            reset_timeout: self.reset_timeout.unwrap_or(base.reset_timeout),
            half_open_timeout: self.half_open_timeout.unwrap_or(base.half_open_timeout),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Partial retry config; set fields win over the base config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(
        rename = "initial_delay_ms",
        with = "opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub initial_delay: Option<Duration>,

    #[serde(
        rename = "max_delay_ms",
        with = "opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_delay: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,
}

impl RetryOverrides {
    /// Merge onto `base`, returning the effective config
    pub fn apply(&self, base: &RetryConfig) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            initial_delay: self.initial_delay.unwrap_or(base.initial_delay),
            max_delay: self.max_delay.unwrap_or(base.max_delay),
            backoff_factor: self.backoff_factor.unwrap_or(base.backoff_factor),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Serialize a `Duration` as integer milliseconds
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Serialize an `Option<Duration>` as optional integer milliseconds
pub mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
