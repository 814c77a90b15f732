/*!
 * Error types for Tether
 */

use std::fmt;
use std::io;
use tether_core_monitor::MonitorError;
use tether_core_resilience::ConfigError;

pub type Result<T> = std::result::Result<T, TetherError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_UNHEALTHY: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum TetherError {
    /// Configuration error
    Config(String),

    /// I/O error
    Io(io::Error),

    /// Attempt log or health computation failed
    Monitor(MonitorError),

    /// One or more integrations are degraded or unhealthy
    Unhealthy { degraded: usize, unhealthy: usize },

    /// Generic error with message
    Other(String),
}

impl TetherError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TetherError::Unhealthy { .. } => EXIT_UNHEALTHY,
            TetherError::Config(_)
            | TetherError::Io(_)
            | TetherError::Monitor(_)
            | TetherError::Other(_) => EXIT_FATAL,
        }
    }

    /// Get error category for reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            TetherError::Config(_) => ErrorCategory::Configuration,
            TetherError::Io(_) => ErrorCategory::IoError,
            TetherError::Monitor(_) => ErrorCategory::Storage,
            TetherError::Unhealthy { .. } => ErrorCategory::Health,
            TetherError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration errors
    Configuration,
    /// I/O operation errors
    IoError,
    /// Attempt log storage errors
    Storage,
    /// Integration health findings
    Health,
    /// Uncategorized errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Health => write!(f, "health"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for TetherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TetherError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            TetherError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            TetherError::Monitor(err) => {
                write!(f, "Monitor error: {}", err)
            }
            TetherError::Unhealthy {
                degraded,
                unhealthy,
            } => {
                write!(
                    f,
                    "{} integration(s) unhealthy, {} degraded",
                    unhealthy, degraded
                )
            }
            TetherError::Other(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl std::error::Error for TetherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TetherError::Io(err) => Some(err),
            TetherError::Monitor(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for TetherError {
    fn from(err: io::Error) -> Self {
        TetherError::Io(err)
    }
}

impl From<MonitorError> for TetherError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::Config(msg) => TetherError::Config(msg),
            other => TetherError::Monitor(other),
        }
    }
}

impl From<ConfigError> for TetherError {
    fn from(err: ConfigError) -> Self {
        TetherError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(err: serde_json::Error) -> Self {
        TetherError::Other(format!("JSON serialization error: {}", err))
    }
}
