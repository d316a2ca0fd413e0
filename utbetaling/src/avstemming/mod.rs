//! Reconciliation jobs against the accounting system

pub mod grensesnitt;
pub mod konsistens;

pub use grensesnitt::{grunnlag, opprett_avstemmingsmeldinger, periode_grense, Bucket, Grensesnittavstemmer};
pub use konsistens::{
    sammenlign, Avvik, HttpOppdragsLedger, Konsistensavstemmer, Konsistensavstemming, LedgerLinje,
    OppdragsLedger,
};
