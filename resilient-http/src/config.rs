//! Client configuration, hooks, and runtime updates.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerConfigOverride, CircuitHook};
use crate::error::{HttpClientError, Result, TransportError};
use crate::retry::{RetryConfig, RetryConfigOverride, RetryHook};

/// Callbacks invoked synchronously by the client.
///
/// Hooks observe; they never change what the client does next. Keep them
/// fast, the retry loop and the breaker wait for them to return.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Called before each retry with the upcoming attempt number.
    pub on_retry: Option<RetryHook>,
    /// Called when the circuit opens.
    pub on_circuit_open: Option<CircuitHook>,
    /// Called when the circuit closes after recovering.
    pub on_circuit_close: Option<CircuitHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_retry", &self.on_retry.is_some())
            .field("on_circuit_open", &self.on_circuit_open.is_some())
            .field("on_circuit_close", &self.on_circuit_close.is_some())
            .finish()
    }
}

/// Everything needed to build a [`ResilientClient`](crate::ResilientClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL that relative request URLs are joined onto.
    pub base_url: Option<String>,
    /// TCP/TLS connect timeout, separate from the per-attempt timeout.
    pub connect_timeout: Duration,
    /// Headers added to every request unless the request sets them.
    pub default_headers: Vec<(String, String)>,
    /// User agent string.
    pub user_agent: String,
    /// Follow 3xx redirects inside a single attempt.
    pub follow_redirects: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Observer callbacks.
    pub hooks: Hooks,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout: Duration::from_secs(10),
            default_headers: Vec::new(),
            user_agent: format!("resilient-http/{}", env!("CARGO_PKG_VERSION")),
            follow_redirects: true,
            max_redirects: 10,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            hooks: Hooks::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Check the configuration before a client is built from it.
    pub fn validate(&self) -> Result<()> {
        if let Some(base) = &self.base_url {
            url::Url::parse(base)
                .map_err(|e| HttpClientError::InvalidUrl(format!("{}: {}", base, e)))?;
        }
        self.retry.validate()?;
        self.circuit_breaker.validate()
    }
}

/// Consuming builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Base URL that relative request paths are joined onto.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.retry.timeout = timeout;
        self
    }

    /// Connect timeout for new connections.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set retry configuration.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.config.retry = config;
        self
    }

    /// Set circuit breaker configuration.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = config;
        self
    }

    /// Add a header sent with every request.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Follow redirects (on by default).
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Redirect limit when following is enabled.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Call `hook` before every retry.
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(u32, &TransportError) + Send + Sync + 'static,
    {
        self.config.hooks.on_retry = Some(Arc::new(hook));
        self
    }

    /// Call `hook` whenever the circuit opens.
    pub fn on_circuit_open<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.config.hooks.on_circuit_open = Some(Arc::new(hook));
        self
    }

    /// Call `hook` whenever the circuit closes.
    pub fn on_circuit_close<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.config.hooks.on_circuit_close = Some(Arc::new(hook));
        self
    }

    /// Finish; validation happens when the client is built.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Changes applied by [`ResilientClient::update_config`](crate::ResilientClient::update_config).
///
/// Only the fields that are set change; the rest keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    /// Retry fields to replace.
    pub retry: RetryConfigOverride,
    /// Circuit breaker fields to replace.
    pub circuit_breaker: CircuitBreakerConfigOverride,
}

impl ConfigUpdate {
    /// Update only retry settings.
    pub fn retry(retry: RetryConfigOverride) -> Self {
        Self {
            retry,
            ..Default::default()
        }
    }

    /// Update only circuit breaker settings.
    pub fn circuit_breaker(circuit_breaker: CircuitBreakerConfigOverride) -> Self {
        Self {
            circuit_breaker,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .base_url("https://api.example.com")
            .timeout(Duration::from_secs(5))
            .default_header("x-api-key", "secret")
            .on_retry(|_, _| {})
            .build();

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.retry.timeout, Duration::from_secs(5));
        assert_eq!(config.default_headers.len(), 1);
        assert!(config.hooks.on_retry.is_some());
        assert!(config.hooks.on_circuit_open.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ClientConfig::builder().base_url("::not a url::").build();
        assert!(matches!(config.validate(), Err(HttpClientError::InvalidUrl(_))));

        let config = ClientConfig::builder()
            .retry(RetryConfig::default().with_max_delay(Duration::from_millis(1)))
            .build();
        assert!(matches!(config.validate(), Err(HttpClientError::Config(_))));

        let config = ClientConfig::builder()
            .circuit_breaker(CircuitBreakerConfig::new(0, Duration::from_secs(1)))
            .build();
        assert!(matches!(config.validate(), Err(HttpClientError::Config(_))));
    }
}
