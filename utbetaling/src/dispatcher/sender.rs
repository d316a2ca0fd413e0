//! Oppdrag sender
//!
//! Writes encoded oppdrag to the send queue with the reply queue as
//! `reply_to`, so the accounting system routes the kvittering back to the
//! receiver. A send either succeeds, fails transiently with
//! [`Error::DispatchUnavailable`], or fails permanently with
//! [`Error::Encoding`].

use crate::{
    config::{DispatchConfig, QueueConfig},
    metrics::OPPDRAG_SENT_TOTAL,
    Error, Result,
};
use backoff::ExponentialBackoffBuilder;
use message_bus::{Message, Publisher};
use oppdrag::Oppdrag;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Sender for the oppdrag queue
#[derive(Debug, Clone)]
pub struct OppdragSender {
    publisher: Publisher,
    send_queue: String,
    reply_queue: String,
    dispatch: DispatchConfig,
}

impl OppdragSender {
    /// Create sender
    pub fn new(publisher: Publisher, queues: &QueueConfig, dispatch: DispatchConfig) -> Self {
        Self {
            publisher,
            send_queue: queues.send.clone(),
            reply_queue: queues.reply.clone(),
            dispatch,
        }
    }

    /// Default priority for ordinary oppdrag
    pub fn priority(&self) -> u8 {
        self.dispatch.priority
    }

    /// Encode and send one oppdrag, returns the correlation id
    pub async fn send(&self, oppdrag: &Oppdrag, priority: u8) -> Result<String> {
        let xml = oppdrag::xml::encode_oppdrag(oppdrag)?;
        self.send_xml(&xml, priority).await
    }

    /// Send an already encoded oppdrag, one attempt
    pub async fn send_xml(&self, xml: &str, priority: u8) -> Result<String> {
        // Malformed payloads never leave the process
        oppdrag::xml::decode_oppdrag(xml)?;

        let correlation_id = Uuid::now_v7().to_string();
        let message = Message::new(self.send_queue.clone(), xml.to_string())
            .with_correlation_id(correlation_id.clone())
            .with_reply_to(self.reply_queue.clone())
            .with_priority(priority);

        match self.publisher.publish(message).await {
            Ok(_) => {
                OPPDRAG_SENT_TOTAL.with_label_values(&["sent"]).inc();
                debug!(correlation_id = %correlation_id, queue = %self.send_queue, "Oppdrag sent");
                Ok(correlation_id)
            }
            Err(e) => {
                let err = Error::from(e);
                let status = if err.is_transient() { "unavailable" } else { "failed" };
                OPPDRAG_SENT_TOTAL.with_label_values(&[status]).inc();
                Err(err)
            }
        }
    }

    /// Send with exponential backoff on transient failures
    ///
    /// Permanent errors return immediately. Once the retry budget is spent
    /// the last [`Error::DispatchUnavailable`] is returned.
    pub async fn send_with_retry(&self, xml: &str, priority: u8) -> Result<String> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.dispatch.retry_initial_interval_ms))
            .with_max_interval(Duration::from_millis(self.dispatch.retry_max_interval_ms))
            .with_max_elapsed_time(Some(Duration::from_millis(
                self.dispatch.retry_max_elapsed_ms,
            )))
            .build();

        let sender = self;
        let result = backoff::future::retry(policy, move || async move {
            sender.send_xml(xml, priority).await.map_err(|e| {
                if e.is_transient() {
                    warn!(error = %e, "Oppdrag send failed, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await;

        if let Ok(correlation_id) = &result {
            info!(correlation_id = %correlation_id, "Oppdrag dispatched");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;
    use message_bus::{InMemoryTransport, PublisherConfig};
    use std::sync::Arc;

    fn sender(transport: &InMemoryTransport, dispatch: DispatchConfig) -> OppdragSender {
        let publisher = Publisher::new(Arc::new(transport.clone()), PublisherConfig::default());
        OppdragSender::new(publisher, &QueueConfig::default(), dispatch)
    }

    fn rask_retry() -> DispatchConfig {
        DispatchConfig {
            retry_initial_interval_ms: 1,
            retry_max_interval_ms: 5,
            retry_max_elapsed_ms: 2_000,
            ..DispatchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_send_routes_reply_to_kvittering_queue() {
        let transport = InMemoryTransport::new();
        let sender = sender(&transport, DispatchConfig::default());
        let oppdrag = testdata::oppdrag();

        let correlation_id = sender.send(&oppdrag, 7).await.unwrap();

        let sent = transport.published_to(&QueueConfig::default().send);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].correlation_id.as_deref(), Some(correlation_id.as_str()));
        assert_eq!(sent[0].reply_to, Some(QueueConfig::default().reply));
        assert_eq!(sent[0].priority, Some(7));
        assert_eq!(
            oppdrag::xml::decode_oppdrag(sent[0].text().unwrap()).unwrap(),
            oppdrag
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_is_never_sent() {
        let transport = InMemoryTransport::new();
        let sender = sender(&transport, rask_retry());

        let err = sender.send_with_retry("<oppdrag><ikke", 4).await.unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
        assert!(!err.is_transient());
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn test_outage_is_dispatch_unavailable() {
        let transport = InMemoryTransport::new();
        transport.fail_next(1);
        let sender = sender(&transport, DispatchConfig::default());

        let err = sender.send(&testdata::oppdrag(), 4).await.unwrap_err();
        assert!(matches!(err, Error::DispatchUnavailable(_)));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_outage() {
        let transport = InMemoryTransport::new();
        transport.fail_next(2);
        let sender = sender(&transport, rask_retry());
        let xml = oppdrag::xml::encode_oppdrag(&testdata::oppdrag()).unwrap();

        sender.send_with_retry(&xml, 4).await.unwrap();
        assert_eq!(transport.published().len(), 1);
    }
}
