//! The transport seam: one attempt at sending a request.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::trace;

use crate::config::ClientConfig;
use crate::error::{ErrorCode, HttpClientError, Result, TransportError};
use crate::{Request, Response};

/// Performs a single network attempt for a request.
///
/// Implementations must enforce `timeout`, report non-2xx responses as
/// [`TransportError::Status`], and stop promptly when the returned future is
/// dropped.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` once, giving up after `timeout`.
    async fn call(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> std::result::Result<Response, TransportError>;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport from the client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let inner = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .redirect(redirect)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| HttpClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { inner })
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    async fn send(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> std::result::Result<Response, TransportError> {
        let mut builder = self
            .inner
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());

        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e, timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&e, timeout))?;

        trace!(status = %status, bytes = body.len(), "Received HTTP response");

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let message = match text.trim() {
                "" => status.canonical_reason().unwrap_or("Unknown status").to_string(),
                text => text.to_string(),
            };
            return Err(TransportError::status(status.as_u16(), message));
        }

        Ok(Response::new(status, headers, body, url))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn call(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> std::result::Result<Response, TransportError> {
        trace!(
            method = %request.method(),
            url = %request.url(),
            timeout = ?timeout,
            "Sending HTTP request"
        );

        match tokio::time::timeout(timeout, self.send(request, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}

/// Translate a reqwest failure into a transport error.
fn map_reqwest_error(error: &reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout(timeout);
    }
    TransportError::network(error_code(error), error_chain(error))
}

/// Find a symbolic code anywhere in the error's source chain.
fn error_code(error: &(dyn StdError + 'static)) -> Option<ErrorCode> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>()
            && let Some(code) = ErrorCode::from_io_kind(io.kind())
        {
            return Some(code);
        }

        let message = err.to_string().to_ascii_lowercase();
        if message.contains("temporary failure in name resolution") {
            return Some(ErrorCode::TemporaryDnsFailure);
        }
        if message.contains("dns error") || message.contains("failed to lookup address") {
            return Some(ErrorCode::HostNotFound);
        }

        current = err.source();
    }
    None
}

/// Join the messages of an error and all its sources.
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        let text = err.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = err.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "tcp connect error")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_code_from_io_source() {
        let err = Wrapper(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(error_code(&err), Some(ErrorCode::ConnectionRefused));
        assert_eq!(error_chain(&err), "tcp connect error: refused");
    }

    #[test]
    fn test_error_code_from_dns_message() {
        let err = io::Error::other("dns error: failed to lookup address information");
        assert_eq!(error_code(&err), Some(ErrorCode::HostNotFound));

        let err = io::Error::other("Temporary failure in name resolution");
        assert_eq!(error_code(&err), Some(ErrorCode::TemporaryDnsFailure));
    }

    #[test]
    fn test_unknown_error_has_no_code() {
        let err = io::Error::other("something odd");
        assert_eq!(error_code(&err), None);
    }
}
