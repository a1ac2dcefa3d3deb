//! Error types for declarative HTTP calls.
//!
//! Every failure in the pipeline surfaces as one [`Error`] value. Setup
//! problems show up as [`Error::ConfigurationError`], network problems as
//! [`Error::Transport`], and the retry engine synthesizes
//! [`Error::RetryExhausted`] when a retryable response keeps failing.

use http::{HeaderMap, StatusCode};
use std::fmt;

/// Classification of a transport failure.
///
/// Retry policies match on these kinds by set membership, so transports are
/// expected to tag their errors as precisely as they can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection could not be established.
    Connect,
    /// The request or response did not complete in time.
    Timeout,
    /// The request could not be built or sent.
    Request,
    /// Reading or writing a body failed midway.
    Body,
    /// Any other I/O failure.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A network-level failure reported by a [`Transport`](crate::Transport).
#[derive(thiserror::Error, Debug)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Creates a transport error of the given kind.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The failure classification.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else if err.is_request() || err.is_builder() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        TransportError::new(kind, err.to_string()).with_source(err)
    }
}

/// The main error type for declarative HTTP calls.
///
/// # Examples
///
/// ```
/// use wirecall::{Error, TransportError, TransportErrorKind};
///
/// let err = Error::from(TransportError::new(TransportErrorKind::Timeout, "read timed out"));
/// assert_eq!(err.transport_kind(), Some(TransportErrorKind::Timeout));
/// assert!(err.is_retryable());
///
/// let err = Error::ConfigurationError("duplicate @Body".to_string());
/// assert!(!err.is_retryable());
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The transport failed to deliver the request or receive a response.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// An endpoint, argument list or client was misconfigured.
    ///
    /// These are never retried and never recoverable at call time.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The retry budget ran out while the server kept answering with a
    /// retryable status.
    #[error("Retries exhausted after {attempts} attempts (last status {status})")]
    RetryExhausted {
        /// Status of the last response received
        status: StatusCode,
        /// Total number of attempts made
        attempts: usize,
    },

    /// The call was canceled before or during execution.
    #[error("Call was canceled")]
    CallCanceled,

    /// The call handle was already executed; clone it to issue it again.
    #[error("Call has already been executed")]
    AlreadyExecuted,

    /// A payload could not be mapped onto the requested type.
    #[error("Hydration failed: {0}")]
    Hydration(String),

    /// Failed to encode the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Failed to decode the response body into the expected shape.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// A typed execution received a non-2xx response.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// An invalid URL was produced or supplied.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if this error describes a transient failure.
    ///
    /// Transport errors, 5xx and 429 responses are transient. Whether a call
    /// actually retries is decided by its [`RetryPolicy`](crate::RetryPolicy).
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::HttpError { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Returns the transport classification for [`Error::Transport`].
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Error::Transport(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. }
            | Error::DeserializationFailed { status, .. }
            | Error::RetryExhausted { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. }
            | Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for declarative HTTP calls.
pub type Result<T> = std::result::Result<T, Error>;
