//! Message subscriber
//!
//! Delivers every message on one subject to a [`MessageHandler`]. A failing
//! handler is logged and the loop moves on to the next message, so one bad
//! message never stops consumption.

use crate::{
    message::Message,
    metrics::{BUS_HANDLED_TOTAL, BUS_HANDLER_DURATION, BUS_HANDLER_FAILURES_TOTAL},
    transport::{MessageStream, Transport},
    Result,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Message handler trait
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle incoming message
    async fn handle(&self, message: Message) -> Result<()>;
}

/// Message subscriber
pub struct Subscriber {
    transport: Arc<dyn Transport>,
    subject: String,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("subject", &self.subject)
            .finish()
    }
}

impl Subscriber {
    /// Create new subscriber
    pub fn new(transport: Arc<dyn Transport>, subject: impl Into<String>) -> Self {
        Self {
            transport,
            subject: subject.into(),
        }
    }

    /// Subject consumed
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Subscribe and process messages until the stream ends
    pub async fn run<H>(&self, handler: Arc<H>) -> Result<()>
    where
        H: MessageHandler + ?Sized + 'static,
    {
        let stream = self.transport.subscribe(&self.subject).await?;
        info!(subject = %self.subject, "Consuming");
        self.consume(stream, handler).await;
        info!(subject = %self.subject, "Stream closed");
        Ok(())
    }

    async fn consume<H>(&self, mut stream: MessageStream, handler: Arc<H>)
    where
        H: MessageHandler + ?Sized + 'static,
    {
        while let Some(message) = stream.next().await {
            let start = Instant::now();
            let id = message.id;

            if let Err(e) = handler.handle(message).await {
                error!(message_id = %id, subject = %self.subject, error = %e, "Error handling message");
                BUS_HANDLER_FAILURES_TOTAL
                    .with_label_values(&[&self.subject])
                    .inc();
            }

            BUS_HANDLED_TOTAL.with_label_values(&[&self.subject]).inc();
            BUS_HANDLER_DURATION
                .with_label_values(&[&self.subject])
                .observe(start.elapsed().as_secs_f64());
        }
    }
}
