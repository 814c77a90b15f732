/*!
 * Configuration types for Tether
 */

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tether_core_monitor::MonitorConfig;
use tether_core_resilience::{CircuitConfig, CircuitOverrides, RetryConfig, RetryOverrides};

use crate::error::{Result, TetherError};

/// Top-level configuration, usually loaded from `tether.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TetherConfig {
    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,

    /// SQLite attempt log (None = in-memory log, lost on exit)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Integrations swept by `monitor` and `watch`
    #[serde(default)]
    pub integrations: Vec<String>,

    /// Default circuit breaker settings
    #[serde(default)]
    pub circuit: CircuitConfig,

    /// Default retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Status windows and health thresholds
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Per-integration settings that win over the defaults above
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, IntegrationOverrides>,
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
            database_path: None,
            integrations: Vec::new(),
            circuit: CircuitConfig::default(),
            retry: RetryConfig::default(),
            monitor: MonitorConfig::default(),
            overrides: BTreeMap::new(),
        }
    }
}

/// Circuit and retry overrides for a single integration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationOverrides {
    #[serde(skip_serializing_if = "CircuitOverrides::is_empty")]
    pub circuit: CircuitOverrides,

    #[serde(skip_serializing_if = "RetryOverrides::is_empty")]
    pub retry: RetryOverrides,
}

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl TetherConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: TetherConfig = toml::from_str(&contents).map_err(|e| {
            TetherError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| TetherError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check every default and every effective per-integration config
    pub fn validate(&self) -> Result<()> {
        self.circuit
            .validate()
            .map_err(|e| TetherError::Config(format!("[circuit] {}", e)))?;
        self.retry
            .validate()
            .map_err(|e| TetherError::Config(format!("[retry] {}", e)))?;
        self.monitor
            .validate()
            .map_err(|e| TetherError::Config(format!("[monitor] {}", e)))?;

        for (id, overrides) in &self.overrides {
            overrides
                .circuit
                .apply(&self.circuit)
                .validate()
                .map_err(|e| TetherError::Config(format!("[overrides.{}.circuit] {}", id, e)))?;
            overrides
                .retry
                .apply(&self.retry)
                .validate()
                .map_err(|e| TetherError::Config(format!("[overrides.{}.retry] {}", id, e)))?;
        }

        Ok(())
    }

    /// Circuit overrides keyed by integration id, as the registry takes them
    pub fn circuit_overrides(&self) -> HashMap<String, CircuitOverrides> {
        self.overrides
            .iter()
            .filter(|(_, o)| !o.circuit.is_empty())
            .map(|(id, o)| (id.clone(), o.circuit.clone()))
            .collect()
    }

    /// Retry overrides keyed by integration id, as the executor takes them
    pub fn retry_overrides(&self) -> HashMap<String, RetryOverrides> {
        self.overrides
            .iter()
            .filter(|(_, o)| !o.retry.is_empty())
            .map(|(id, o)| (id.clone(), o.retry.clone()))
            .collect()
    }
}
