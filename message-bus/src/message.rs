//! Message envelope for queue transport
//!
//! The payload travels as raw bytes (XML for oppdrag and avstemming, JSON for
//! vedtak triggers). Envelope metadata is carried in transport headers so
//! the payload is exactly what the external system receives.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Header carrying the message id
pub const HEADER_MESSAGE_ID: &str = "Message-Id";
/// Header carrying the correlation id
pub const HEADER_CORRELATION_ID: &str = "Correlation-Id";
/// Header carrying the delivery priority
pub const HEADER_PRIORITY: &str = "Priority";

/// Message envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Message ID (UUIDv7 for ordering)
    pub id: Uuid,

    /// Destination subject
    pub subject: String,

    /// Payload
    pub payload: Bytes,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Correlation ID, echoed on replies
    pub correlation_id: Option<String>,

    /// Reply subject
    pub reply_to: Option<String>,

    /// Delivery priority (0-9, higher first)
    pub priority: Option<u8>,
}

impl Message {
    /// Create new message
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::now_v7(),
            subject: subject.into(),
            payload: payload.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            reply_to: None,
            priority: None,
        }
    }

    /// Create message with a JSON payload
    pub fn json<T: Serialize>(subject: impl Into<String>, value: &T) -> crate::Result<Self> {
        Ok(Self::new(subject, serde_json::to_vec(value)?))
    }

    /// Set correlation ID
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Set reply-to subject
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Set priority, clamped to 0-9
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority.min(9));
        self
    }

    /// Payload as UTF-8 text
    pub fn text(&self) -> crate::Result<&str> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| crate::Error::Handler(format!("Payload is not UTF-8: {}", e)))
    }

    /// Payload parsed as JSON
    pub fn parse_json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Transport headers for this envelope
    pub fn nats_headers(&self) -> async_nats::HeaderMap {
        let mut headers = async_nats::HeaderMap::new();
        headers.insert(HEADER_MESSAGE_ID, self.id.to_string().as_str());
        if let Some(correlation_id) = &self.correlation_id {
            headers.insert(HEADER_CORRELATION_ID, correlation_id.as_str());
        }
        if let Some(priority) = self.priority {
            headers.insert(HEADER_PRIORITY, priority.to_string().as_str());
        }
        headers
    }

    /// Rebuild envelope from a received NATS message
    pub fn from_nats(msg: async_nats::Message) -> Self {
        let header = |name: &str| {
            msg.headers
                .as_ref()
                .and_then(|h| h.get(name))
                .map(|v| v.to_string())
        };

        let id = header(HEADER_MESSAGE_ID)
            .and_then(|v| Uuid::parse_str(&v).ok())
            .unwrap_or_else(Uuid::now_v7);
        let correlation_id = header(HEADER_CORRELATION_ID);
        let priority = header(HEADER_PRIORITY).and_then(|v| v.parse().ok());

        Self {
            id,
            subject: msg.subject.to_string(),
            payload: msg.payload,
            timestamp: Utc::now(),
            correlation_id,
            reply_to: msg.reply.map(|r| r.to_string()),
            priority,
        }
    }
}
