//! Error types for dispatch, reconciliation and scheduling

use thiserror::Error;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Service errors
#[derive(Error, Debug)]
pub enum Error {
    /// Queue unreachable or send timed out, safe to retry
    #[error("Dispatch unavailable: {0}")]
    DispatchUnavailable(String),

    /// Payload could not be encoded or decoded, never retried
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Oppdrag could not be built from the aggregate
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] utbetaling_core::Error),

    /// Leader election endpoint failed
    #[error("Leader election error: {0}")]
    Leader(String),

    /// Ledger lookup during konsistensavstemming failed
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-transient message bus error
    #[error("Message bus error: {0}")]
    Bus(message_bus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::DispatchUnavailable(_))
    }
}

impl From<oppdrag::Error> for Error {
    fn from(err: oppdrag::Error) -> Self {
        match err {
            oppdrag::Error::Mapping(msg) => Error::Mapping(msg),
            other => Error::Encoding(other.to_string()),
        }
    }
}

impl From<message_bus::Error> for Error {
    fn from(err: message_bus::Error) -> Self {
        if err.is_transient() {
            Error::DispatchUnavailable(err.to_string())
        } else {
            Error::Bus(err)
        }
    }
}
