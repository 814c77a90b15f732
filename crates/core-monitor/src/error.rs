//! Error types for the failure monitor

use thiserror::Error;

/// Errors that can occur while reading the attempt log or classifying health
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The attempt store rejected a read or write
    #[error("Attempt store error: {0}")]
    Store(String),

    /// SQLite backend error
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The integration registry could not list active integrations
    #[error("Integration registry error: {0}")]
    Registry(String),

    /// Invalid monitor configuration
    #[error("Invalid monitor configuration: {0}")]
    Config(String),

    /// The background attempt writer is no longer running
    #[error("Attempt writer has shut down")]
    WriterClosed,
}

pub type Result<T> = std::result::Result<T, MonitorError>;
