//! Message publisher with bounded send time
//!
//! A publish that does not complete within `publish_timeout` fails with
//! [`Error::Timeout`], which is transient. Retry is left to the caller so it
//! can decide between resend and escalation.

use crate::{
    message::Message,
    metrics::{BUS_PUBLISH_DURATION, BUS_PUBLISH_TIMEOUTS_TOTAL, BUS_PUBLISH_TOTAL},
    transport::Transport,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Publish timeout in milliseconds
    pub publish_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            publish_timeout_ms: 5000,
        }
    }
}

/// Message publisher
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    config: PublisherConfig,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").field("config", &self.config).finish()
    }
}

impl Publisher {
    /// Create new publisher
    pub fn new(transport: Arc<dyn Transport>, config: PublisherConfig) -> Self {
        Self { transport, config }
    }

    /// Publish message, returns the message id
    pub async fn publish(&self, message: Message) -> Result<uuid::Uuid> {
        let start = Instant::now();
        let subject = message.subject.clone();
        let id = message.id;
        let timeout = Duration::from_millis(self.config.publish_timeout_ms);

        debug!(message_id = %id, subject = %subject, "Publishing message");

        let result = match tokio::time::timeout(timeout, self.transport.publish(message)).await {
            Ok(result) => result,
            Err(_) => {
                BUS_PUBLISH_TIMEOUTS_TOTAL.with_label_values(&[&subject]).inc();
                Err(Error::Timeout(self.config.publish_timeout_ms))
            }
        };

        BUS_PUBLISH_DURATION
            .with_label_values(&[&subject])
            .observe(start.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok(_) => "ok",
            Err(Error::Timeout(_)) => "timeout",
            Err(_) => "failed",
        };
        BUS_PUBLISH_TOTAL.with_label_values(&[&subject, outcome]).inc();

        if let Err(e) = &result {
            warn!(message_id = %id, subject = %subject, error = %e, "Publish failed");
        }

        result.map(|_| id)
    }
}
