//! HTTP client error types.
//!
//! A single transport attempt fails with a [`TransportError`]. The retry loop
//! pairs the last one with the number of attempts made ([`AttemptError`]), and
//! the client surfaces everything as [`HttpClientError`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// Symbolic class of a network-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Connection reset by peer (`ECONNRESET`).
    ConnectionReset,
    /// Connection refused (`ECONNREFUSED`).
    ConnectionRefused,
    /// Connection aborted (`ECONNABORTED`).
    ConnectionAborted,
    /// Socket-level timeout (`ETIMEDOUT`).
    TimedOut,
    /// Host name could not be resolved (`ENOTFOUND`).
    HostNotFound,
    /// Temporary name resolution failure (`EAI_AGAIN`).
    TemporaryDnsFailure,
    /// Network unreachable (`ENETUNREACH`).
    NetworkUnreachable,
    /// Host unreachable (`EHOSTUNREACH`).
    HostUnreachable,
    /// Write on a closed connection (`EPIPE`).
    BrokenPipe,
}

impl ErrorCode {
    /// All known codes.
    pub const ALL: [ErrorCode; 9] = [
        Self::ConnectionReset,
        Self::ConnectionRefused,
        Self::ConnectionAborted,
        Self::TimedOut,
        Self::HostNotFound,
        Self::TemporaryDnsFailure,
        Self::NetworkUnreachable,
        Self::HostUnreachable,
        Self::BrokenPipe,
    ];

    /// The conventional symbolic name, e.g. `ECONNRESET`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionReset => "ECONNRESET",
            Self::ConnectionRefused => "ECONNREFUSED",
            Self::ConnectionAborted => "ECONNABORTED",
            Self::TimedOut => "ETIMEDOUT",
            Self::HostNotFound => "ENOTFOUND",
            Self::TemporaryDnsFailure => "EAI_AGAIN",
            Self::NetworkUnreachable => "ENETUNREACH",
            Self::HostUnreachable => "EHOSTUNREACH",
            Self::BrokenPipe => "EPIPE",
        }
    }

    /// Map an I/O error kind onto a symbolic code, if one applies.
    pub fn from_io_kind(kind: std::io::ErrorKind) -> Option<Self> {
        use std::io::ErrorKind;

        match kind {
            ErrorKind::ConnectionReset => Some(Self::ConnectionReset),
            ErrorKind::ConnectionRefused => Some(Self::ConnectionRefused),
            ErrorKind::ConnectionAborted => Some(Self::ConnectionAborted),
            ErrorKind::TimedOut => Some(Self::TimedOut),
            ErrorKind::BrokenPipe => Some(Self::BrokenPipe),
            ErrorKind::NetworkUnreachable => Some(Self::NetworkUnreachable),
            ErrorKind::HostUnreachable => Some(Self::HostUnreachable),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = HttpClientError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HttpClientError::Config(format!("unknown error code: {}", s)))
    }
}

/// Coarse kind of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The attempt exceeded its timeout.
    Timeout,
    /// The attempt was aborted before completing.
    Abort,
    /// Any other failure (status or network).
    Other,
}

/// Failure of a single transport attempt.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or canonical reason.
        message: String,
    },

    /// The request never produced a response.
    #[error("Network error{}: {message}", .code.map(|c| format!(" ({})", c)).unwrap_or_default())]
    Network {
        /// Symbolic error class, when it could be determined.
        code: Option<ErrorCode>,
        /// Error message.
        message: String,
    },

    /// The attempt exceeded its timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The attempt was aborted.
    #[error("Request aborted")]
    Aborted,
}

impl TransportError {
    /// Create a status failure.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Create a network failure.
    pub fn network(code: Option<ErrorCode>, message: impl Into<String>) -> Self {
        Self::Network {
            code,
            message: message.into(),
        }
    }

    /// HTTP status code, for status failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Symbolic network error code, for network failures.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Network { code, .. } => *code,
            _ => None,
        }
    }

    /// Coarse failure kind.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Aborted => FailureKind::Abort,
            Self::Status { .. } | Self::Network { .. } => FailureKind::Other,
        }
    }
}

/// The failure that ended a retry loop, with the number of attempts made.
#[derive(Debug, Clone, Error)]
#[error("Request failed after {attempts} attempt(s): {source}")]
pub struct AttemptError {
    /// Last transport failure.
    #[source]
    pub source: TransportError,
    /// Attempts made, including the failing one.
    pub attempts: u32,
}

impl AttemptError {
    /// Create a new attempt error.
    pub fn new(source: TransportError, attempts: u32) -> Self {
        Self { source, attempts }
    }
}

/// Raised by the circuit breaker when it rejects a call without running it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Circuit breaker is open, request rejected")]
pub struct CircuitOpenError;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Request failed; carries the last transport failure and attempt count.
    #[error(transparent)]
    Attempt(#[from] AttemptError),

    /// Circuit breaker is open, rejecting requests.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// Invalid client or retry configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request building error.
    #[error("Failed to build request: {0}")]
    RequestBuild(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Response body could not be decoded.
    #[error("Failed to decode response body: {0}")]
    Decode(String),
}

impl HttpClientError {
    /// Check if this error is a circuit breaker rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }

    /// Check if the last attempt timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self.transport_error(), Some(TransportError::Timeout(_)))
    }

    /// Get the HTTP status code if the last attempt failed with one.
    pub fn status_code(&self) -> Option<u16> {
        self.transport_error().and_then(TransportError::status_code)
    }

    /// Get the network error code if the last attempt failed with one.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.transport_error().and_then(TransportError::error_code)
    }

    /// Number of transport attempts made, zero if none were.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Attempt(e) => e.attempts,
            _ => 0,
        }
    }

    /// The transport failure behind this error, if any.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Attempt(e) => Some(&e.source),
            _ => None,
        }
    }
}
