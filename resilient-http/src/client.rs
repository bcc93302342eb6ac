//! The resilient client: retries inside a shared circuit breaker.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;
use url::Url;

use crate::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, ClientConfig, ConfigUpdate,
    HttpClientError, ReqwestTransport, Request, RequestBuilder, Response, Result, RetryConfig,
    RetryExecutor, RetryHook, Transport,
};

/// HTTP client that retries transient failures and sheds load when a
/// service keeps failing.
///
/// Every request runs through one shared [`CircuitBreaker`]; inside it, a
/// [`RetryExecutor`] retries the transport call with exponential backoff.
/// Clones share the breaker and the retry configuration.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    base_url: Option<Url>,
    default_headers: Arc<HeaderMap>,
    retry: Arc<RwLock<RetryConfig>>,
    circuit_breaker: Arc<CircuitBreaker>,
    on_retry: Option<RetryHook>,
}

impl ResilientClient {
    /// Create a new client that sends requests with reqwest.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a new client on top of a custom transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| HttpClientError::InvalidUrl(e.to_string()))?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| HttpClientError::Config(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| HttpClientError::Config(format!("invalid header value for {}: {}", name, e)))?;
            default_headers.insert(name, value);
        }

        let mut circuit_breaker = CircuitBreaker::new(config.circuit_breaker);
        if let Some(hook) = config.hooks.on_circuit_open {
            circuit_breaker = circuit_breaker.on_open(hook);
        }
        if let Some(hook) = config.hooks.on_circuit_close {
            circuit_breaker = circuit_breaker.on_close(hook);
        }

        Ok(Self {
            transport,
            base_url,
            default_headers: Arc::new(default_headers),
            retry: Arc::new(RwLock::new(config.retry)),
            circuit_breaker: Arc::new(circuit_breaker),
            on_retry: config.hooks.on_retry,
        })
    }

    /// Start a GET request. `url` may be relative to the configured base URL.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, url)
    }

    /// Start a POST request.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, url)
    }

    /// Start a PUT request.
    pub fn put(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PUT, url)
    }

    /// Start a PATCH request.
    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PATCH, url)
    }

    /// Start a DELETE request.
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::DELETE, url)
    }

    /// Start a HEAD request.
    pub fn head(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::HEAD, url)
    }

    /// Start a request with any method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, url.into())
    }

    /// Send a built request: one breaker-guarded call wrapping the retry loop.
    ///
    /// The request's retry overrides are merged over the client's retry
    /// configuration first; an invalid result fails before anything is sent.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let config = {
            let base = self.retry.read();
            if request.overrides().is_empty() {
                base.clone()
            } else {
                base.merge(request.overrides())?
            }
        };

        let timeout = config.timeout;
        let executor = RetryExecutor::new(config).on_retry(self.on_retry.clone());
        let transport = self.transport.as_ref();
        let request = &request;

        self.circuit_breaker
            .execute(|| async move {
                executor
                    .run(move |attempt| {
                        trace!(
                            attempt = attempt + 1,
                            method = %request.method(),
                            url = %request.url(),
                            "Attempting request"
                        );
                        transport.call(request, timeout)
                    })
                    .await
                    .map_err(HttpClientError::from)
            })
            .await
    }

    /// Copy of the circuit breaker's current state and counters.
    pub fn circuit_breaker_state(&self) -> CircuitBreakerSnapshot {
        self.circuit_breaker.snapshot()
    }

    /// Force the circuit breaker closed and clear its counters.
    pub fn reset_circuit_breaker(&self) {
        self.circuit_breaker.reset();
    }

    /// The shared circuit breaker.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Current base retry configuration.
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.read().clone()
    }

    /// Current circuit breaker configuration.
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        self.circuit_breaker.config()
    }

    /// Change retry and circuit breaker settings for future requests.
    ///
    /// Requests already in flight keep the configuration they started with.
    /// Nothing changes if the merged configuration is invalid.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<()> {
        let mut retry = self.retry.write();
        let merged_retry = retry.merge(&update.retry)?;
        let merged_breaker = self.circuit_breaker.config().merge(&update.circuit_breaker)?;

        *retry = merged_retry;
        self.circuit_breaker.update_config(merged_breaker);
        Ok(())
    }

    pub(crate) fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub(crate) fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("base_url", &self.base_url)
            .field("retry", &*self.retry.read())
            .field("circuit_breaker", &self.circuit_breaker)
            .finish_non_exhaustive()
    }
}
