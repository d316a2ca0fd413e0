//! NATS client

use crate::{
    message::Message,
    metrics::BUS_CONNECT_ATTEMPTS_TOTAL,
    transport::{MessageStream, Transport},
    Error, Result,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// NATS connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// Server URL
    pub url: String,

    /// Connection name shown in server monitoring
    pub connection_name: String,

    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            connection_name: "etterlatte-utbetaling".to_string(),
            connect_timeout_ms: 5000,
        }
    }
}

/// Connected NATS client
#[derive(Debug, Clone)]
pub struct NatsClient {
    client: async_nats::Client,
}

impl NatsClient {
    /// Connect to the server
    pub async fn connect(config: &NatsConfig) -> Result<Self> {
        info!(url = %config.url, "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .name(&config.connection_name)
            .connection_timeout(Duration::from_millis(config.connect_timeout_ms))
            .connect(config.url.as_str())
            .await
            .map_err(|e| {
                BUS_CONNECT_ATTEMPTS_TOTAL.with_label_values(&["failed"]).inc();
                Error::Connection(e.to_string())
            })?;

        BUS_CONNECT_ATTEMPTS_TOTAL.with_label_values(&["connected"]).inc();
        info!(url = %config.url, "Connected to NATS");

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for NatsClient {
    async fn publish(&self, message: Message) -> Result<()> {
        let headers = message.nats_headers();
        let subject = message.subject.clone();

        match message.reply_to.clone() {
            Some(reply) => self
                .client
                .publish_with_reply_and_headers(subject, reply, headers, message.payload)
                .await
                .map_err(|e| Error::Publish(e.to_string()))?,
            None => self
                .client
                .publish_with_headers(subject, headers, message.payload)
                .await
                .map_err(|e| Error::Publish(e.to_string()))?,
        }

        self.client
            .flush()
            .await
            .map_err(|e| Error::Publish(format!("Flush failed: {}", e)))
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| Error::Subscribe(e.to_string()))?;

        info!(subject = %subject, "Subscribed");
        Ok(subscriber.map(Message::from_nats).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = NatsConfig::default();
        assert_eq!(config.url, "nats://localhost:4222");
        assert_eq!(config.connect_timeout_ms, 5000);
    }

    #[tokio::test]
    #[ignore] // Requires NATS server
    async fn test_connect() {
        let client = NatsClient::connect(&NatsConfig::default()).await.unwrap();
        let mut stream = client.subscribe("etterlatte.test").await.unwrap();
        client
            .publish(Message::new("etterlatte.test", "hei").with_priority(3))
            .await
            .unwrap();

        let received = stream.next().await.unwrap();
        assert_eq!(received.text().unwrap(), "hei");
        assert_eq!(received.priority, Some(3));
    }
}
