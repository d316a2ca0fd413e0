//! Error types for message bus

use thiserror::Error;

/// Message bus error
#[derive(Debug, Error)]
pub enum Error {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Publish error
    #[error("Publish error: {0}")]
    Publish(String),

    /// Subscribe error
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// Publish did not complete in time
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Transport closed
    #[error("Transport closed")]
    Closed,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Handler rejected a message
    #[error("Handler error: {0}")]
    Handler(String),
}

impl Error {
    /// Worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Publish(_) | Error::Timeout(_)
        )
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Connection("refused".into()).is_transient());
        assert!(Error::Publish("no responders".into()).is_transient());
        assert!(Error::Timeout(5000).is_transient());
        assert!(!Error::Closed.is_transient());
        assert!(!Error::Handler("bad payload".into()).is_transient());
    }
}
