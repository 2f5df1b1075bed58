//! Pipeline error types.

use http::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// Type-erased error source shared between context clones.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by handlers, transports and the dispatcher.
///
/// Sources are reference counted so an error can sit in a [`Context`](crate::Context)
/// that gets cloned.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The request body could not be read or buffered.
    #[error("Failed to read request body: {0}")]
    Body(Arc<std::io::Error>),

    /// Network-level failure reported by the transport.
    #[error("Transport error: {0}")]
    Transport(BoxError),

    /// The transport gave up waiting.
    #[error("Request timed out: {0}")]
    Timeout(BoxError),

    /// The connection could not be established.
    #[error("Connection error: {0}")]
    Connection(BoxError),

    /// A response was classified as a failure (5xx or 429).
    #[error("Server response error: {0}")]
    Server(StatusCode),

    /// A response carried an error status and the caller asked to fail on it.
    #[error("HTTP error status: {0}")]
    Status(StatusCode),

    /// The request URL could not be parsed or is not absolute.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A header name or value was rejected.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A body could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// More redirects than the configured limit.
    #[error("Stopped after {0} redirects")]
    RedirectLimitExceeded(usize),

    /// The request object was already sent once.
    #[error("Request was already dispatched")]
    AlreadyDispatched,

    /// The pipeline finished without a response or an error.
    #[error("No response was produced")]
    NoResponse,

    /// The context has no transport to perform the round trip.
    #[error("No transport configured")]
    NoTransport,

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized.
    #[error("Logging error: {0}")]
    Logging(String),

    /// Error raised by a middleware handler.
    #[error("{0}")]
    Handler(BoxError),
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

impl Error {
    /// Create a handler error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Handler(Arc::new(Message(message.into())))
    }

    /// Wrap an arbitrary error raised by a handler.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(error))
    }

    /// Wrap a network-level error.
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Arc::new(error))
    }

    /// Check if this error is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::Connection(_) => true,
            Self::Server(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Get the HTTP status code if this error was produced from a response.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Server(status) | Self::Status(status) => Some(*status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Body(Arc::new(error))
    }
}

impl From<http::Error> for Error {
    fn from(error: http::Error) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}
