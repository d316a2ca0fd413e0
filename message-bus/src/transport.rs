//! Transport abstraction
//!
//! [`Transport`] is the seam between queue-facing code and the broker.
//! [`NatsClient`](crate::NatsClient) is the production implementation;
//! [`InMemoryTransport`] backs tests and single-process runs.

use crate::{message::Message, Error, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Stream of received messages
pub type MessageStream = BoxStream<'static, Message>;

/// Queue transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one message to `message.subject`
    async fn publish(&self, message: Message) -> Result<()>;

    /// Receive messages published to `subject` from now on
    async fn subscribe(&self, subject: &str) -> Result<MessageStream>;
}

/// In-process transport
///
/// Every published message is fanned out to current subscribers of its
/// subject and kept in a log for inspection.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Message>>>>,
    published: Mutex<Vec<Message>>,
    failures: AtomicU32,
}

impl InMemoryTransport {
    /// Create empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` publishes fail with a connection error
    pub fn fail_next(&self, count: u32) {
        self.inner.failures.store(count, Ordering::SeqCst);
    }

    /// All messages published so far
    pub fn published(&self) -> Vec<Message> {
        self.inner.published.lock().clone()
    }

    /// Messages published to `subject`
    pub fn published_to(&self, subject: &str) -> Vec<Message> {
        self.inner
            .published
            .lock()
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, message: Message) -> Result<()> {
        let failing = self
            .inner
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Connection("Simulated broker outage".to_string()));
        }

        if let Some(senders) = self.inner.subscribers.lock().get_mut(&message.subject) {
            senders.retain(|tx| tx.send(message.clone()).is_ok());
        }
        self.inner.published.lock().push(message);
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .lock()
            .entry(subject.to_string())
            .or_default()
            .push(tx);

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_fan_out_to_subscribers() {
        let transport = InMemoryTransport::new();
        let mut a = transport.subscribe("kvittering").await.unwrap();
        let mut b = transport.subscribe("kvittering").await.unwrap();

        transport.publish(Message::new("kvittering", "one")).await.unwrap();
        transport.publish(Message::new("annet", "two")).await.unwrap();

        assert_eq!(a.next().await.unwrap().text().unwrap(), "one");
        assert_eq!(b.next().await.unwrap().text().unwrap(), "one");
        assert_eq!(transport.published().len(), 2);
        assert_eq!(transport.published_to("annet").len(), 1);
    }

    #[tokio::test]
    async fn test_simulated_failures() {
        let transport = InMemoryTransport::new();
        transport.fail_next(2);

        assert!(transport.publish(Message::new("s", "1")).await.is_err());
        assert!(transport.publish(Message::new("s", "2")).await.is_err());
        assert!(transport.publish(Message::new("s", "3")).await.is_ok());
        assert_eq!(transport.published().len(), 1);
    }
}
