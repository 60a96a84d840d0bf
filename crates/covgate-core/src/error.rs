//! Error types for the coverage gate.

use thiserror::Error;

/// Errors that can occur during a gate run.
#[derive(Error, Debug)]
pub enum GateError {
    /// Required configuration is missing or invalid. Raised pre-flight,
    /// before any side effect.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Transport-level failure (DNS, connect, TLS, timeout) on a read.
    #[error("Network error: {0}")]
    Network(String),

    /// Retryable failure: 5xx from a remote, or transport failure on a
    /// safely-repeatable mutation.
    #[error("Transient error: {0}")]
    Transient(String),

    /// The remote returned a non-2xx status for a resource we expected
    /// to exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The review system rejected our credentials (401/403).
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// The fetched artifact body was empty.
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// The badge artifact could not be parsed into a percentage.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Some object operations exhausted their retries. Completed uploads
    /// and deletes are not rolled back; the next run converges.
    #[error("Partial publish: {} object(s) failed: {}", failed_keys.len(), failed_keys.join(", "))]
    PartialPublish {
        /// Remote keys whose upload or delete never succeeded.
        failed_keys: Vec<String>,
    },

    /// The run was cancelled between retry attempts.
    #[error("Run cancelled")]
    Cancelled,

    /// IO error reading the local report directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Whether the orchestrator may retry the operation that produced
    /// this error. Malformed input and rejected credentials are not
    /// fixed by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::Network(_) | GateError::Transient(_))
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            GateError::Network(err.to_string())
        } else {
            GateError::Transient(err.to_string())
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(GateError::Network("refused".into()).is_retryable());
        assert!(GateError::Transient("502".into()).is_retryable());
        assert!(!GateError::Parse("no token".into()).is_retryable());
        assert!(!GateError::Auth("bad token".into()).is_retryable());
        assert!(!GateError::NotFound("gone".into()).is_retryable());
        assert!(!GateError::Cancelled.is_retryable());
    }

    #[test]
    fn test_partial_publish_message_lists_keys() {
        let err = GateError::PartialPublish {
            failed_keys: vec!["index.html".into(), "badge.svg".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 object(s)"));
        assert!(msg.contains("badge.svg"));
    }
}
