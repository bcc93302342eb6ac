//! # Resilient HTTP
//!
//! An HTTP client that retries transient failures with exponential backoff
//! and stops calling an unhealthy service through a shared circuit breaker.
//!
//! ## Features
//!
//! - **Retry with Backoff**: Exponential delays, capped, with optional full jitter
//! - **Failure Classification**: Retry only on configured status codes and network error codes
//! - **Circuit Breaker**: Closed / open / half-open state machine shared by every request
//! - **Timeouts**: Per-attempt deadlines, configurable per request
//! - **Hooks**: Callbacks on retry, circuit open and circuit close
//! - **Runtime Reconfiguration**: Update retry and breaker settings on a live client
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resilient_http::{ClientConfig, ResilientClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ResilientClient::new(ClientConfig::default())?;
//!
//!     let response = client
//!         .get("https://api.example.com/users")
//!         .send()
//!         .await?;
//!
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## With Retry and Circuit Breaker
//!
//! ```rust,no_run
//! use resilient_http::{CircuitBreakerConfig, ClientConfig, ResilientClient, RetryConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("https://api.example.com")
//!         .retry(RetryConfig::exponential(3, Duration::from_millis(100)))
//!         .circuit_breaker(CircuitBreakerConfig::new(5, Duration::from_secs(60)))
//!         .on_retry(|attempt, error| eprintln!("retry #{attempt}: {error}"))
//!         .on_circuit_open(|| eprintln!("circuit opened"))
//!         .build();
//!
//!     let client = ResilientClient::new(config)?;
//!
//!     // Transient failures are retried inside one breaker-guarded call.
//!     let response = client
//!         .post("/orders")
//!         .json(&serde_json::json!({"item": "widget", "quantity": 5}))
//!         .timeout(Duration::from_secs(5))
//!         .send()
//!         .await?;
//!
//!     println!("{}", response.text()?);
//!     println!("{:?}", client.circuit_breaker_state());
//!     Ok(())
//! }
//! ```

mod backoff;
mod circuit_breaker;
mod classifier;
mod client;
mod config;
mod error;
mod request;
mod response;
mod retry;
mod transport;

pub use backoff::calculate_delay;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigOverride, CircuitBreakerSnapshot,
    CircuitBreakerStats, CircuitHook, CircuitState,
};
pub use classifier::is_retryable;
pub use client::ResilientClient;
pub use config::{ClientConfig, ClientConfigBuilder, ConfigUpdate, Hooks};
pub use error::{
    AttemptError, CircuitOpenError, ErrorCode, FailureKind, HttpClientError, Result,
    TransportError,
};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use retry::{
    DEFAULT_RETRYABLE_ERROR_CODES, DEFAULT_RETRYABLE_STATUSES, RetryConfig, RetryConfigOverride,
    RetryExecutor, RetryHook,
};
pub use transport::{ReqwestTransport, Transport};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use resilient_http::prelude::*;
/// ```
pub mod prelude {
    pub use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
    pub use crate::client::ResilientClient;
    pub use crate::config::{ClientConfig, ConfigUpdate};
    pub use crate::error::{ErrorCode, HttpClientError, Result, TransportError};
    pub use crate::request::RequestBuilder;
    pub use crate::response::Response;
    pub use crate::retry::{RetryConfig, RetryConfigOverride};
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
}
