//! Leader election
//!
//! Only the leader runs scheduled reconciliation. Leadership is asked for
//! on every tick and never cached.

use crate::{config::LeaderConfig, Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Answers whether this instance currently leads
#[async_trait]
pub trait LeaderElector: Send + Sync {
    /// Ask the elector
    async fn is_leader(&self) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct ElectorResponse {
    name: String,
}

/// Elector sidecar queried over HTTP
///
/// The endpoint answers `{ "name": "<hostname of the leader>" }`.
#[derive(Debug, Clone)]
pub struct HttpLeaderElector {
    client: reqwest::Client,
    url: String,
    hostname: String,
}

impl HttpLeaderElector {
    /// Create elector for `url`, identifying as `hostname`
    pub fn new(url: impl Into<String>, hostname: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Leader(format!("Failed to build client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            hostname: hostname.into(),
        })
    }
}

#[async_trait]
impl LeaderElector for HttpLeaderElector {
    async fn is_leader(&self) -> Result<bool> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Leader(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Leader(format!(
                "Elector returned {}",
                response.status()
            )));
        }

        let leder: ElectorResponse = response
            .json()
            .await
            .map_err(|e| Error::Leader(format!("Invalid elector response: {}", e)))?;

        debug!(leader = %leder.name, hostname = %self.hostname, "Elector answered");
        Ok(leder.name == self.hostname)
    }
}

/// Fixed answer, for single-instance deployments and tests
#[derive(Debug, Clone, Copy)]
pub struct StaticLeaderElector(pub bool);

#[async_trait]
impl LeaderElector for StaticLeaderElector {
    async fn is_leader(&self) -> Result<bool> {
        Ok(self.0)
    }
}

/// Elector for `config`
///
/// Without an elector URL this instance is always the leader.
pub fn from_config(config: &LeaderConfig) -> Result<Arc<dyn LeaderElector>> {
    let Some(url) = &config.elector_url else {
        return Ok(Arc::new(StaticLeaderElector(true)));
    };

    let hostname = match &config.hostname {
        Some(hostname) => hostname.clone(),
        None => std::env::var("HOSTNAME")
            .map_err(|_| Error::Config("leader.hostname or HOSTNAME must be set".to_string()))?,
    };

    Ok(Arc::new(HttpLeaderElector::new(
        url.clone(),
        hostname,
        Duration::from_millis(config.timeout_ms),
    )?))
}
