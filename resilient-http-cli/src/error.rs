//! Error types for the rhttp CLI.

use resilient_http::HttpClientError;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug, Error)]
pub enum CliError {
    /// IO error (reading a body file or stdin)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request failed
    #[error(transparent)]
    Http(#[from] HttpClientError),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
