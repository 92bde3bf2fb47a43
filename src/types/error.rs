//! Error types for Relaygate
//!
//! Relay calls are classified into protocol misuse, transient failures and
//! terminal disconnects. Workers decide retry policy from that classification.

/// Main error type for Relaygate operations
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Malformed relay call. Caller bug, never retried.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transient relay failure; the caller may retry.
    #[error("Relay timeout: {0}")]
    Timeout(String),

    /// The device endpoint is confirmed gone.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Cache was required but could not be reached.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Whether the owning device session must be torn down
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }

    /// Whether the failed call may be retried by the worker
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Http(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<redis::RedisError> for GateError {
    fn from(err: redis::RedisError) -> Self {
        Self::Cache(err.to_string())
    }
}

impl From<mongodb::error::Error> for GateError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for Relaygate operations
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(GateError::ConnectionClosed("gone".into()).is_terminal());
        assert!(!GateError::Timeout("slow".into()).is_terminal());
        assert!(GateError::Timeout("slow".into()).is_retryable());
        assert!(!GateError::Protocol("bad call".into()).is_retryable());
        assert!(!GateError::CacheUnavailable("down".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = GateError::Protocol("binary payload without command".into());
        assert_eq!(
            err.to_string(),
            "Protocol error: binary payload without command"
        );
    }
}
