//! Oppdrag
//!
//! Wire side of payment dispatch: the mapping from an Utbetaling to the
//! accounting system's `oppdrag` document, the XML codecs for oppdrag,
//! kvitteringer and reconciliation batches, and receipt interpretation.
//!
//! Everything in this crate is pure. Errors are structural and never
//! retryable: a payload that fails to map or encode must not be sent.
//!
//! # Example
//!
//! ```no_run
//! # fn example(utbetaling: &utbetaling_core::Utbetaling) -> oppdrag::Result<()> {
//! let oppdrag = oppdrag::to_oppdrag(utbetaling, true, false)?;
//! let xml = oppdrag::xml::encode_oppdrag(&oppdrag)?;
//! assert_eq!(oppdrag::xml::decode_oppdrag(&xml)?, oppdrag);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod avstemmingsdata;
pub mod error;
pub mod klassifikasjon;
pub mod kvittering;
pub mod mapper;
pub mod model;
pub mod xml;

// Re-exports
pub use error::{Error, Result};
pub use klassifikasjon::klassifikasjonskode;
pub use kvittering::Kvittering;
pub use mapper::to_oppdrag;
pub use model::Oppdrag;
