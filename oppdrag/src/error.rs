//! Error types for oppdrag mapping and codecs

use thiserror::Error;

/// Result type for oppdrag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Oppdrag errors
///
/// All variants are structural: the payload must not be sent and retrying
/// the same input gives the same error.
#[derive(Error, Debug)]
pub enum Error {
    /// Aggregate violates a mapping invariant
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// XML serialization failed
    #[error("XML encode error: {0}")]
    Encode(String),

    /// XML could not be parsed into the wire model
    #[error("XML decode error: {0}")]
    Decode(String),

    /// Receipt carries an outcome code outside the known set
    #[error("Unknown alvorlighetsgrad in kvittering: {0}")]
    UnknownAlvorlighetsgrad(String),
}

impl From<quick_xml::DeError> for Error {
    fn from(err: quick_xml::DeError) -> Self {
        Error::Decode(err.to_string())
    }
}
