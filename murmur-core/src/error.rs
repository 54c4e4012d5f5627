//! Error types for chat calls
//!
//! Every error that ends a call reaches the caller through the completion
//! callback. Line-level errors never do: they are logged and the stream
//! carries on.

use thiserror::Error;

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors that end a chat call
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// The configured endpoint could not be parsed as an http(s) URL
    #[error("Malformed endpoint '{endpoint}': {reason}")]
    MalformedEndpoint { endpoint: String, reason: String },

    /// The request body could not be encoded
    #[error("Failed to serialize request: {0}")]
    Serialization(String),

    /// Network or HTTP level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend reported an error inside the stream
    #[error("Backend error: {message}")]
    Backend { message: String },

    /// A single line grew past the configured limit without a newline
    #[error("Stream line exceeded {limit} bytes")]
    FrameTooLarge { limit: usize },

    /// The client could not be constructed from its configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ChatError {
    /// True when the error came from the network layer
    pub fn is_transport(&self) -> bool {
        matches!(self, ChatError::Transport(_))
    }
}

/// Network failures, reported via the completion callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not connect to the backend
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Connect or read timed out
    #[error("Request timed out")]
    Timeout,

    /// The backend rejected the credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body failed mid-stream
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// Any other network error
    #[error("Network error: {0}")]
    Network(String),
}

impl TransportError {
    /// Whether a caller-side retry has a reasonable chance of succeeding.
    ///
    /// The client itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Timeout | Self::Network(_) | Self::Body(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Authentication(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                401 | 403 => TransportError::Authentication(err.to_string()),
                code => TransportError::Status {
                    status: code,
                    message: err.to_string(),
                },
            }
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.into())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(err.to_string())
    }
}

/// A single response line that could not be interpreted. Non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineParseError {
    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

impl From<serde_json::Error> for LineParseError {
    fn from(err: serde_json::Error) -> Self {
        LineParseError::InvalidJson(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_transport_errors() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(TransportError::Status {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(TransportError::Status {
            status: 429,
            message: "slow down".into()
        }
        .is_retryable());
        assert!(!TransportError::Status {
            status: 400,
            message: "bad".into()
        }
        .is_retryable());
        assert!(!TransportError::Authentication("nope".into()).is_retryable());
    }

    #[test]
    fn test_transport_error_wraps_transparently() {
        let err: ChatError = TransportError::Timeout.into();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "Request timed out");
    }

    #[test]
    fn test_json_error_becomes_line_parse_error() {
        let err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let line_err: LineParseError = err.into();
        assert!(matches!(line_err, LineParseError::InvalidJson(_)));
    }
}
