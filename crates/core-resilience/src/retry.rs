//! Retry Executor: bounded attempts with exponential backoff
//!
//! Every attempt first passes the integration's circuit gate, so retries never
//! hammer an integration whose circuit is already open. Each attempt that runs
//! is reported to the [`AttemptRecorder`], including attempts later superseded
//! by a success.
//!
//! The backoff sleep is a tokio timer, so waiting integrations never block a
//! worker thread. Dropping the returned future, or cancelling the token passed
//! to [`RetryExecutor::with_retry_cancellable`], stops the loop: no further
//! attempts run and nothing more is recorded.

use crate::config::{CircuitConfig, RetryConfig, RetryOverrides};
use crate::error::CallError;
use crate::recorder::AttemptRecorder;
use crate::registry::CircuitRegistry;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Wraps integration calls with retry, backoff and circuit gating
#[derive(Clone)]
pub struct RetryExecutor {
    circuits: CircuitRegistry,
    recorder: Arc<dyn AttemptRecorder>,
    defaults: Arc<RetryConfig>,
    overrides: Arc<HashMap<String, RetryOverrides>>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("circuits", &self.circuits.len())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl RetryExecutor {
    /// Create an executor gating through `circuits` and reporting to `recorder`
    pub fn new(
        circuits: CircuitRegistry,
        recorder: Arc<dyn AttemptRecorder>,
        defaults: RetryConfig,
    ) -> Self {
        Self {
            circuits,
            recorder,
            defaults: Arc::new(defaults),
            overrides: Arc::new(HashMap::new()),
        }
    }

    /// Attach per-integration retry overrides (merged onto the defaults)
    pub fn with_overrides(mut self, overrides: HashMap<String, RetryOverrides>) -> Self {
        self.overrides = Arc::new(overrides);
        self
    }

    /// The circuit registry consulted before each attempt
    pub fn circuits(&self) -> &CircuitRegistry {
        &self.circuits
    }

    /// Effective retry configuration for an integration
    pub fn config_for(&self, integration_id: &str) -> RetryConfig {
        match self.overrides.get(integration_id) {
            Some(overrides) => overrides.apply(&self.defaults),
            None => (*self.defaults).clone(),
        }
    }

    /// Retry `op` using the integration's effective retry config
    pub async fn with_retry<F, Fut, T, E>(
        &self,
        integration_id: &str,
        op: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let config = self.config_for(integration_id);
        self.run(integration_id, &config, None, None, op).await
    }

    /// Retry `op` with an explicit retry config
    pub async fn with_retry_config<F, Fut, T, E>(
        &self,
        integration_id: &str,
        config: &RetryConfig,
        op: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run(integration_id, config, None, None, op).await
    }

    /// Retry `op`, stopping as soon as `cancel` fires
    pub async fn with_retry_cancellable<F, Fut, T, E>(
        &self,
        integration_id: &str,
        config: &RetryConfig,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run(integration_id, config, None, Some(cancel), op).await
    }

    /// The full retry loop.
    ///
    /// `circuit` replaces the integration's effective circuit config for the
    /// gate checks of this call; `cancel` makes the loop cancellable.
    pub async fn run<F, Fut, T, E>(
        &self,
        integration_id: &str,
        config: &RetryConfig,
        circuit: Option<&CircuitConfig>,
        cancel: Option<&CancellationToken>,
        mut op: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        config.validate()?;
        if let Some(circuit) = circuit {
            circuit.validate()?;
        }

        let max_attempts = config.max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;

            if cancel.is_some_and(|token| token.is_cancelled()) {
                return Err(CallError::Cancelled);
            }

            let permit = self.circuits.acquire(integration_id, circuit)?;
            debug!(integration_id, attempt, max_attempts, "Attempting integration call");

            let outcome = match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            debug!(integration_id, attempt, "Call cancelled mid-attempt");
                            return Err(CallError::Cancelled);
                        }
                        outcome = op() => outcome,
                    }
                }
                None => op().await,
            };

            let error = match outcome {
                Ok(value) => {
                    permit.record_success();
                    self.recorder.record_attempt(integration_id, true, None);
                    if attempt > 1 {
                        debug!(integration_id, attempt, "Integration call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    permit.record_failure();
                    self.recorder
                        .record_attempt(integration_id, false, Some(error.to_string()));
                    error
                }
            };

            if attempt >= max_attempts {
                warn!(
                    integration_id,
                    attempts = attempt,
                    error = %error,
                    "Integration call failed, retries exhausted"
                );
                return Err(CallError::Operation(error));
            }

            let delay = config.delay_for(attempt);
            warn!(
                integration_id,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Integration call failed, retrying"
            );

            match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(CallError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
    }
}
