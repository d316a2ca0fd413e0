//! Dispatcher
//!
//! - [`OppdragSender`]: writes oppdrag to the send queue
//! - [`KvitteringMottaker`]: applies receipts from the reply queue
//! - [`VedtakMottaker`]: turns attested vedtak into dispatched oppdrag

pub mod kvittering;
pub mod sender;
pub mod vedtak;

pub use kvittering::KvitteringMottaker;
pub use sender::OppdragSender;
pub use vedtak::{bygg_utbetaling, VedtakMottaker};
