//! Error types for gated integration calls

use crate::circuit_breaker::CircuitState;
use std::time::Duration;
use thiserror::Error;

/// The circuit for an integration rejected the call; the operation never ran.
///
/// Always recoverable: back off and try again later, or reset the circuit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Circuit for integration '{integration_id}' is {state}, rejecting call")]
pub struct CircuitOpenError {
    /// Integration whose circuit rejected the call
    pub integration_id: String,
    /// State of the circuit at rejection time (Open, or HalfOpen with a trial in flight)
    pub state: CircuitState,
    /// Time until the circuit will admit a trial call, when known
    pub retry_after: Option<Duration>,
}

/// Outcome of a gated call that did not produce a value.
///
/// `E` is the wrapped operation's own error type and is passed through untouched.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// Gate rejected the call
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// The operation itself failed (the last attempt's error when retried)
    #[error("Operation failed: {0}")]
    Operation(E),

    /// The caller cancelled the call before it completed
    #[error("Call cancelled before completion")]
    Cancelled,

    /// The per-call config was rejected before any attempt ran
    #[error("Invalid call config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl<E> CallError<E> {
    /// Check if the call was rejected by an open circuit
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::CircuitOpen(_))
    }

    /// Check if the call was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallError::Cancelled)
    }

    /// Borrow the operation error, if the operation ran and failed
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            CallError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Consume into the operation error, if the operation ran and failed
    pub fn into_operation(self) -> Option<E> {
        match self {
            CallError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Invalid circuit or retry configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failure_threshold must be greater than 0")]
    ZeroFailureThreshold,

    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("backoff_factor must be greater than 1 (got {0})")]
    BackoffFactor(String),

    #[error("initial_delay ({initial:?}) must not exceed max_delay ({max:?})")]
    DelayOrder { initial: Duration, max: Duration },
}
