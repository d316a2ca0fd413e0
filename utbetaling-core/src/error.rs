//! Error types for the utbetaling store

use crate::types::{UtbetalingId, UtbetalingslinjeId, VedtakId};
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Store errors
#[derive(Error, Debug)]
pub enum Error {
    /// An Utbetaling already exists for this vedtak
    #[error("Utbetaling already exists for vedtak {0}")]
    DuplicateVedtak(VedtakId),

    /// Utbetaling not found
    #[error("Utbetaling not found: {0}")]
    UtbetalingNotFound(String),

    /// Correction chain violation
    #[error("Line {linje} replaces unknown or later line {erstatter}")]
    InvalidErstatter {
        /// Line carrying the back-reference
        linje: UtbetalingslinjeId,
        /// Referenced line
        erstatter: UtbetalingslinjeId,
    },

    /// Line id already present in the sak's line table
    #[error("Duplicate line id {0}")]
    DuplicateLinje(UtbetalingslinjeId),

    /// Line does not belong to the Utbetaling it is created with
    #[error("Line {0} does not belong to the utbetaling being created")]
    ForeignLinje(UtbetalingslinjeId),

    /// Generated oppdrag differs from the one already recorded
    #[error("Utbetaling {0} already has a different oppdrag payload")]
    OppdragConflict(UtbetalingId),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
