//! Error type for calls against the chat backend.

use reqwest::StatusCode;
use thiserror::Error;

/// The single failure kind for every backend operation.
///
/// The variants exist for log and display messages only. Callers treat every
/// `TransportError` the same way regardless of which variant it is.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection, DNS, TLS or timeout failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("server returned {status}")]
    Status { status: StatusCode },

    /// The body did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The request task was cancelled or panicked before it resolved
    #[error("request aborted: {0}")]
    Aborted(String),
}

impl TransportError {
    pub fn status(status: StatusCode) -> Self {
        Self::Status { status }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted(message.into())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<tokio::task::JoinError> for TransportError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Aborted(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message() {
        let err = TransportError::status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "server returned 500 Internal Server Error");
    }

    #[test]
    fn test_json_error_is_malformed() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: TransportError = json_err.into();
        assert!(matches!(err, TransportError::Malformed(_)));
    }
}
