//! Error types for the HTTP client.

use http::HeaderMap;
use thiserror::Error;

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Main error type for the HTTP client.
///
/// Every failure carries an explicit origin so callers and the retry policy
/// never have to guess from a zero status code whether a request timed out,
/// was cancelled, or never reached the server.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Malformed request configuration. Never retried.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// No response was received (DNS, connection refused, reset).
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// The client's own timer fired before the transport call settled.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// The caller cancelled the request through its cancellation token.
    #[error("Request cancelled by caller")]
    CallerAborted,

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} {status_text}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        status_text: String,
        /// Error body parsed as JSON, else as text, else absent
        body: Option<serde_json::Value>,
        /// Response headers
        headers: HeaderMap,
    },

    /// Access token refresh failed; raised to every request waiting on it.
    #[error("Token refresh failed: {message}")]
    RefreshFailed {
        /// Error message from the refresh operation
        message: String,
    },

    /// Request or response payload could not be (de)serialized.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },

    /// A streamed body failed mid-way.
    #[error("Stream error: {message}")]
    Stream {
        /// Error message describing the stream issue
        message: String,
    },
}

/// Discriminant of [`TransportError`], convenient for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`TransportError::Config`]
    Config,
    /// See [`TransportError::Network`]
    Network,
    /// See [`TransportError::Timeout`]
    Timeout,
    /// See [`TransportError::CallerAborted`]
    CallerAborted,
    /// See [`TransportError::HttpStatus`]
    HttpStatus,
    /// See [`TransportError::RefreshFailed`]
    RefreshFailed,
    /// See [`TransportError::Serialization`]
    Serialization,
    /// See [`TransportError::Stream`]
    Stream,
}

impl TransportError {
    /// Builds a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        TransportError::Config {
            message: message.into(),
        }
    }

    /// Builds a network error.
    pub fn network(message: impl Into<String>) -> Self {
        TransportError::Network {
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Config { .. } => ErrorKind::Config,
            TransportError::Network { .. } => ErrorKind::Network,
            TransportError::Timeout { .. } => ErrorKind::Timeout,
            TransportError::CallerAborted => ErrorKind::CallerAborted,
            TransportError::HttpStatus { .. } => ErrorKind::HttpStatus,
            TransportError::RefreshFailed { .. } => ErrorKind::RefreshFailed,
            TransportError::Serialization { .. } => ErrorKind::Serialization,
            TransportError::Stream { .. } => ErrorKind::Stream,
        }
    }

    /// Status code following the browser fetch convention.
    ///
    /// HTTP errors report the server status, aborts (timeout or caller) report
    /// `0`, and everything else reports no status.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus { status, .. } => Some(*status),
            TransportError::Timeout { .. } | TransportError::CallerAborted => Some(0),
            _ => None,
        }
    }

    /// Returns true for a 401 response.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TransportError::HttpStatus { status: 401, .. })
    }

    /// Returns true when the request was aborted, by timer or by the caller.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. } | TransportError::CallerAborted
        )
    }

    /// Parsed error body of an HTTP error, if any.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            TransportError::HttpStatus { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// Response headers of an HTTP error, if any.
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            TransportError::HttpStatus { headers, .. } => Some(headers),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            TransportError::Config {
                message: format!("Invalid request: {}", err),
            }
        } else if err.is_connect() {
            TransportError::Network {
                message: format!("Connection failed: {}", err),
            }
        } else if err.is_body() || err.is_decode() {
            TransportError::Stream {
                message: format!("Failed to read body: {}", err),
            }
        } else {
            TransportError::Network {
                message: format!("Network error: {}", err),
            }
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization {
            message: format!("JSON serialization/deserialization error: {}", err),
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        TransportError::Config {
            message: format!("Invalid URL: {}", err),
        }
    }
}

impl From<http::header::InvalidHeaderValue> for TransportError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        TransportError::Config {
            message: format!("Invalid header value: {}", err),
        }
    }
}

impl From<http::header::InvalidHeaderName> for TransportError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        TransportError::Config {
            message: format!("Invalid header name: {}", err),
        }
    }
}
