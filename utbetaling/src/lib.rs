//! Utbetaling dispatch and reconciliation service
//!
//! Turns attested vedtak into oppdrag for the accounting system, records
//! kvitteringer as they come back, and reconciles what was sent:
//! - [`dispatcher`]: vedtak intake, oppdrag sender, kvittering receiver
//! - [`avstemming`]: grensesnitt- and konsistensavstemming
//! - [`scheduler`] and [`leader`]: periodic jobs, run on the leader only

#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod avstemming;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod leader;
pub mod metrics;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testdata;

pub use config::Config;
pub use error::{Error, Result};
pub use leader::{HttpLeaderElector, LeaderElector, StaticLeaderElector};
pub use scheduler::{JobScheduler, ScheduledJob};
