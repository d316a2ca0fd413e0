//! Utbetaling core
//!
//! Aggregate, receipt log and persistence for dispatched payment instructions.
//!
//! # Architecture
//!
//! - **Event Sourcing**: effective status is a projection over the append-only
//!   hendelse log, there is no status setter
//! - **Immutable core**: identity fields, vedtak snapshot and avstemmingsnøkkel
//!   are fixed when an Utbetaling is created
//! - **Line arena**: payment lines live in an append-only table per sak and
//!   corrections link to earlier lines by id
//!
//! # Invariants
//!
//! - One Utbetaling per vedtak
//! - Replayed receipts never create duplicate hendelser
//! - `erstatter_id` always references an earlier line in the same sak

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod linjer;
pub mod status;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use status::Utbetalingsstatus;
pub use storage::RocksDbUtbetalingStore;
pub use store::{InMemoryUtbetalingStore, UtbetalingStore};
pub use types::*;
