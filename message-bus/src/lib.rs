//! Message bus
//!
//! Queue transport for oppdrag, kvittering and avstemming traffic:
//! - [`Transport`] seam with a NATS implementation and an in-process one
//! - [`Publisher`] with bounded send time
//! - [`Subscriber`] that keeps consuming past handler failures
//! - Prometheus metrics per subject

#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod client;
pub mod error;
pub mod message;
pub mod metrics;
pub mod publisher;
pub mod subscriber;
pub mod transport;

pub use client::{NatsClient, NatsConfig};
pub use error::{Error, Result};
pub use message::Message;
pub use publisher::{Publisher, PublisherConfig};
pub use subscriber::{MessageHandler, Subscriber};
pub use transport::{InMemoryTransport, MessageStream, Transport};
