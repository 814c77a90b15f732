//! Integration registry: the source of "currently active" integration ids

use crate::config::window_start;
use crate::error::Result;
use crate::store::AttemptStore;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Supplies the integration ids that `monitor_all` sweeps
#[async_trait]
pub trait IntegrationRegistry: Send + Sync {
    async fn active_integrations(&self) -> Result<Vec<String>>;
}

/// Fixed list of integrations, typically taken from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    ids: Vec<String>,
}

impl StaticRegistry {
    /// Build from any list of ids; duplicates are removed, order is kept
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for id in ids {
            let id = id.into();
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self { ids: unique }
    }
}

#[async_trait]
impl IntegrationRegistry for StaticRegistry {
    async fn active_integrations(&self) -> Result<Vec<String>> {
        Ok(self.ids.clone())
    }
}

/// Treats every integration with at least one logged attempt in the trailing
/// window as active
pub struct RecentActivityRegistry {
    store: Arc<dyn AttemptStore>,
    window: Duration,
}

impl RecentActivityRegistry {
    pub fn new(store: Arc<dyn AttemptStore>, window: Duration) -> Self {
        Self { store, window }
    }
}

#[async_trait]
impl IntegrationRegistry for RecentActivityRegistry {
    async fn active_integrations(&self) -> Result<Vec<String>> {
        let since = window_start(Utc::now(), self.window)?;
        self.store.integrations_since(since).await
    }
}
