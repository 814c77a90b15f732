//! Circuit Registry: one circuit per integration id
//!
//! Circuits are created lazily on first use and live until the registry is
//! dropped. The map is sharded ([`DashMap`]) and each circuit carries its own
//! lock, so unrelated integrations never contend with each other.
//!
//! # Example
//!
//! ```no_run
//! use tether_core_resilience::{CallError, CircuitRegistry};
//!
//! # async fn example() -> Result<(), CallError<std::io::Error>> {
//! let registry = CircuitRegistry::new_default();
//!
//! let roster = registry
//!     .execute("google-classroom", || async {
//!         // Network call to the integration
//!         Ok::<_, std::io::Error>(vec!["student-1".to_string()])
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::circuit_breaker::{CallPermit, Circuit, CircuitSnapshot};
use crate::config::{CircuitConfig, CircuitOverrides};
use crate::error::{CallError, CircuitOpenError};
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Registry of per-integration circuits sharing a default configuration
#[derive(Debug, Clone)]
pub struct CircuitRegistry {
    circuits: Arc<DashMap<String, Arc<Circuit>>>,
    defaults: Arc<CircuitConfig>,
    overrides: Arc<HashMap<String, CircuitOverrides>>,
}

impl CircuitRegistry {
    /// Create a registry whose circuits use `defaults` unless overridden
    pub fn new(defaults: CircuitConfig) -> Self {
        Self {
            circuits: Arc::new(DashMap::new()),
            defaults: Arc::new(defaults),
            overrides: Arc::new(HashMap::new()),
        }
    }

    /// Create a registry with default configuration
    pub fn new_default() -> Self {
        Self::new(CircuitConfig::default())
    }

    /// Attach per-integration overrides (merged onto the defaults)
    pub fn with_overrides(mut self, overrides: HashMap<String, CircuitOverrides>) -> Self {
        self.overrides = Arc::new(overrides);
        self
    }

    /// Effective configuration for an integration
    pub fn config_for(&self, integration_id: &str) -> CircuitConfig {
        match self.overrides.get(integration_id) {
            Some(overrides) => overrides.apply(&self.defaults),
            None => (*self.defaults).clone(),
        }
    }

    /// Circuit for an integration, created closed on first use
    pub fn circuit(&self, integration_id: &str) -> Arc<Circuit> {
        if let Some(circuit) = self.circuits.get(integration_id) {
            return circuit.clone();
        }
        self.circuits
            .entry(integration_id.to_string())
            .or_insert_with(|| Arc::new(Circuit::new(integration_id)))
            .clone()
    }

    /// Ask the integration's gate for permission to run one call.
    ///
    /// `config` replaces the integration's effective config for this call only;
    /// the circuit state itself is shared by all calls for the integration.
    pub fn acquire(
        &self,
        integration_id: &str,
        config: Option<&CircuitConfig>,
    ) -> Result<CallPermit, CircuitOpenError> {
        let circuit = self.circuit(integration_id);
        match config {
            Some(config) => circuit.try_acquire(config),
            None => circuit.try_acquire(&self.config_for(integration_id)),
        }
    }

    /// Run `op` through the integration's circuit using its effective config.
    ///
    /// When the circuit is open the operation is never invoked.
    pub async fn execute<F, Fut, T, E>(
        &self,
        integration_id: &str,
        op: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire(integration_id, None)?;
        Self::run(permit, op).await
    }

    /// Run `op` through the integration's circuit with an explicit config
    pub async fn execute_with<F, Fut, T, E>(
        &self,
        integration_id: &str,
        config: &CircuitConfig,
        op: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire(integration_id, Some(config))?;
        Self::run(permit, op).await
    }

    async fn run<F, Fut, T, E>(permit: CallPermit, op: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match op().await {
            Ok(value) => {
                permit.record_success();
                Ok(value)
            }
            Err(e) => {
                permit.record_failure();
                Err(CallError::Operation(e))
            }
        }
    }

    /// Read-only status; unknown integrations report a fresh closed circuit
    pub fn status(&self, integration_id: &str) -> CircuitSnapshot {
        match self.circuits.get(integration_id) {
            Some(circuit) => circuit.snapshot(),
            None => CircuitSnapshot::closed(integration_id),
        }
    }

    /// Force an integration's circuit closed. Idempotent.
    pub fn reset(&self, integration_id: &str) {
        if let Some(circuit) = self.circuits.get(integration_id) {
            circuit.reset();
        }
    }

    /// Snapshots of every circuit created so far, ordered by integration id
    pub fn snapshot_all(&self) -> Vec<CircuitSnapshot> {
        let mut snapshots: Vec<CircuitSnapshot> =
            self.circuits.iter().map(|entry| entry.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.integration_id.cmp(&b.integration_id));
        snapshots
    }

    /// Number of circuits created so far
    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::new_default()
    }
}
