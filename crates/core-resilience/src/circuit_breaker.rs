//! Per-integration circuit breaker state machine
//!
//! The circuit prevents hammering a failing integration by failing fast while
//! the integration is unhealthy. It has three states:
//! - Closed: calls pass through, consecutive failures are counted
//! - Open: calls are rejected until `reset_timeout` has elapsed
//! - HalfOpen: exactly one trial call is admitted to test recovery
//!
//! Admission hands out a [`CallPermit`]. The permit must be resolved with
//! [`CallPermit::record_success`] or [`CallPermit::record_failure`]; a trial
//! permit dropped without either (the caller was cancelled) frees the trial
//! slot so the next call becomes the trial.
//!
//! The state lock is a synchronous mutex held only for the transition itself,
//! never across an `.await`.

use crate::config::CircuitConfig;
use crate::error::CircuitOpenError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// State of a circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through normally
    Closed,
    /// Calls fail immediately
    Open,
    /// A single trial call checks whether the integration recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Read-only view of a circuit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub integration_id: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    /// A half-open trial call is currently running
    pub trial_in_flight: bool,
}

impl CircuitSnapshot {
    /// Snapshot of a circuit that has never been used
    pub fn closed(integration_id: impl Into<String>) -> Self {
        Self {
            integration_id: integration_id.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            trial_in_flight: false,
        }
    }
}

#[derive(Debug)]
struct CircuitCore {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    /// Latest failure (or half-open timeout) while open; the reset timeout counts from here
    open_since: Option<Instant>,
    half_open_since: Option<Instant>,
    trial_in_flight: bool,
    /// Incremented per admitted trial so stale trial results can be told apart
    trial_generation: u64,
}

impl CircuitCore {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            open_since: None,
            half_open_since: None,
            trial_in_flight: false,
            trial_generation: 0,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.open_since = Some(now);
        self.half_open_since = None;
        self.trial_in_flight = false;
    }

    fn admit_trial(&mut self, now: Instant) -> u64 {
        self.state = CircuitState::HalfOpen;
        self.half_open_since = Some(now);
        self.trial_in_flight = true;
        self.trial_generation += 1;
        self.trial_generation
    }

    fn is_current_trial(&self, generation: u64) -> bool {
        self.state == CircuitState::HalfOpen
            && self.trial_in_flight
            && self.trial_generation == generation
    }
}

/// Circuit breaker for a single integration
#[derive(Debug)]
pub struct Circuit {
    integration_id: String,
    core: Mutex<CircuitCore>,
}

impl Circuit {
    /// Create a closed circuit
    pub fn new(integration_id: impl Into<String>) -> Self {
        Self {
            integration_id: integration_id.into(),
            core: Mutex::new(CircuitCore::new()),
        }
    }

    pub fn integration_id(&self) -> &str {
        &self.integration_id
    }

    /// Current state without applying any time-based transition
    pub fn snapshot(&self) -> CircuitSnapshot {
        let core = self.core.lock();
        CircuitSnapshot {
            integration_id: self.integration_id.clone(),
            state: core.state,
            failure_count: core.failure_count,
            last_failure_time: core.last_failure_time,
            trial_in_flight: core.trial_in_flight,
        }
    }

    /// Force the circuit closed and clear its counters. Idempotent.
    pub fn reset(&self) {
        let mut core = self.core.lock();
        let previous = core.state;
        *core = CircuitCore {
            // Keep the generation moving so in-flight trial permits become stale
            trial_generation: core.trial_generation + 1,
            ..CircuitCore::new()
        };
        info!(
            integration_id = %self.integration_id,
            from = %previous,
            "Circuit reset to closed"
        );
    }

    /// Ask the gate for permission to run one call.
    ///
    /// Applies time-based transitions (Open -> HalfOpen after `reset_timeout`,
    /// stuck HalfOpen -> Open after `half_open_timeout`) before deciding.
    pub fn try_acquire(
        self: &Arc<Self>,
        config: &CircuitConfig,
    ) -> Result<CallPermit, CircuitOpenError> {
        let now = Instant::now();
        let mut core = self.core.lock();

        match core.state {
            CircuitState::Closed => Ok(CallPermit::new(self.clone(), config, None)),
            CircuitState::Open => {
                let elapsed = core
                    .open_since
                    .map(|since| now.saturating_duration_since(since))
                    .unwrap_or(config.reset_timeout);

                if elapsed >= config.reset_timeout {
                    let generation = core.admit_trial(now);
                    info!(
                        integration_id = %self.integration_id,
                        failure_count = core.failure_count,
                        "Circuit half-open, admitting trial call"
                    );
                    Ok(CallPermit::new(self.clone(), config, Some(generation)))
                } else {
                    Err(self.rejection(CircuitState::Open, Some(config.reset_timeout - elapsed)))
                }
            }
            CircuitState::HalfOpen => {
                if !core.trial_in_flight {
                    let generation = core.admit_trial(now);
                    debug!(
                        integration_id = %self.integration_id,
                        "Previous trial abandoned, admitting a new trial call"
                    );
                    return Ok(CallPermit::new(self.clone(), config, Some(generation)));
                }

                let trial_age = core
                    .half_open_since
                    .map(|since| now.saturating_duration_since(since))
                    .unwrap_or_default();

                if trial_age > config.half_open_timeout {
                    core.open(now);
                    warn!(
                        integration_id = %self.integration_id,
                        trial_age_ms = trial_age.as_millis() as u64,
                        "Half-open trial timed out, circuit reopened"
                    );
                    Err(self.rejection(CircuitState::Open, Some(config.reset_timeout)))
                } else {
                    Err(self.rejection(CircuitState::HalfOpen, None))
                }
            }
        }
    }

    fn rejection(
        &self,
        state: CircuitState,
        retry_after: Option<std::time::Duration>,
    ) -> CircuitOpenError {
        debug!(integration_id = %self.integration_id, %state, "Circuit rejected call");
        CircuitOpenError {
            integration_id: self.integration_id.clone(),
            state,
            retry_after,
        }
    }

    fn on_success(&self, trial: Option<u64>) {
        let mut core = self.core.lock();

        match core.state {
            CircuitState::Closed => {
                core.failure_count = 0;
            }
            CircuitState::HalfOpen => match trial {
                Some(generation) if core.is_current_trial(generation) => {
                    core.state = CircuitState::Closed;
                    core.failure_count = 0;
                    core.open_since = None;
                    core.half_open_since = None;
                    core.trial_in_flight = false;
                    info!(
                        integration_id = %self.integration_id,
                        "Trial call succeeded, circuit closed"
                    );
                }
                _ => {
                    debug!(
                        integration_id = %self.integration_id,
                        "Ignoring success from a call that is not the current trial"
                    );
                }
            },
            CircuitState::Open => {
                // Late result of a call admitted before the circuit opened
            }
        }
    }

    fn on_failure(&self, threshold: u32, trial: Option<u64>) {
        let now = Instant::now();
        let mut core = self.core.lock();

        core.failure_count = core.failure_count.saturating_add(1);
        core.last_failure_time = Some(Utc::now());

        match core.state {
            CircuitState::Closed => {
                if core.failure_count >= threshold {
                    core.open(now);
                    warn!(
                        integration_id = %self.integration_id,
                        failure_count = core.failure_count,
                        threshold,
                        "Failure threshold reached, circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                let was_trial = trial.is_some_and(|g| core.is_current_trial(g));
                core.open(now);
                warn!(
                    integration_id = %self.integration_id,
                    failure_count = core.failure_count,
                    was_trial,
                    "Failure while half-open, circuit reopened"
                );
            }
            CircuitState::Open => {
                // Late failure of a call admitted before the circuit opened
                core.open_since = Some(now);
                debug!(
                    integration_id = %self.integration_id,
                    failure_count = core.failure_count,
                    "Failure while open, reset timer restarted"
                );
            }
        }
    }

    fn abandon_trial(&self, generation: u64) {
        let mut core = self.core.lock();
        if core.is_current_trial(generation) {
            core.trial_in_flight = false;
            debug!(
                integration_id = %self.integration_id,
                "Trial call abandoned, trial slot released"
            );
        }
    }
}

/// Permission to run one call through a circuit.
///
/// Resolve it with the call's outcome. Dropping it unresolved records nothing.
#[derive(Debug)]
#[must_use = "a permit must be resolved with the call outcome"]
pub struct CallPermit {
    circuit: Arc<Circuit>,
    failure_threshold: u32,
    trial: Option<u64>,
    resolved: bool,
}

impl CallPermit {
    fn new(circuit: Arc<Circuit>, config: &CircuitConfig, trial: Option<u64>) -> Self {
        Self {
            circuit,
            failure_threshold: config.failure_threshold,
            trial,
            resolved: false,
        }
    }

    /// This permit was admitted as the half-open trial call
    pub fn is_trial(&self) -> bool {
        self.trial.is_some()
    }

    pub fn record_success(mut self) {
        self.resolved = true;
        self.circuit.on_success(self.trial);
    }

    pub fn record_failure(mut self) {
        self.resolved = true;
        self.circuit.on_failure(self.failure_threshold, self.trial);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.resolved {
            if let Some(generation) = self.trial {
                self.circuit.abandon_trial(generation);
            }
        }
    }
}
