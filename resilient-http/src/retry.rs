//! Retry configuration and the bounded retry loop.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backoff::calculate_delay;
use crate::classifier::is_retryable;
use crate::error::{AttemptError, ErrorCode, HttpClientError, Result, TransportError};

/// Callback fired before each retry with the upcoming attempt number
/// (1 for the first retry) and the failure that caused it.
pub type RetryHook = Arc<dyn Fn(u32, &TransportError) + Send + Sync>;

/// Status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Network error codes retried by default.
pub const DEFAULT_RETRYABLE_ERROR_CODES: [ErrorCode; 6] = [
    ErrorCode::ConnectionReset,
    ErrorCode::ConnectionRefused,
    ErrorCode::TimedOut,
    ErrorCode::HostNotFound,
    ErrorCode::TemporaryDnsFailure,
    ErrorCode::BrokenPipe,
];

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt; `0` means a single attempt.
    pub max_retries: u32,
    /// Timeout for each individual attempt.
    pub timeout: Duration,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Randomize delays with full jitter.
    pub jitter: bool,
    /// Status codes that should trigger a retry.
    pub retryable_statuses: HashSet<u16>,
    /// Network error codes that should trigger a retry.
    pub retryable_error_codes: HashSet<ErrorCode>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(30),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            retryable_error_codes: DEFAULT_RETRYABLE_ERROR_CODES.into_iter().collect(),
        }
    }
}

impl RetryConfig {
    /// Create a retry config with exponential backoff starting at `base_delay`.
    pub fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: base_delay.max(Duration::from_secs(30)),
            ..Default::default()
        }
    }

    /// A config that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum delay between attempts.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Disable jitter, making delays deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Replace the retryable status codes.
    pub fn with_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = codes.into_iter().collect();
        self
    }

    /// Replace the retryable network error codes.
    pub fn with_error_codes(mut self, codes: impl IntoIterator<Item = ErrorCode>) -> Self {
        self.retryable_error_codes = codes.into_iter().collect();
        self
    }

    /// Calculate delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        calculate_delay(attempt, self.base_delay, self.max_delay, self.jitter)
    }

    /// Check if a failed attempt should be retried.
    pub fn is_retryable(&self, error: &TransportError) -> bool {
        is_retryable(error, &self.retryable_statuses, &self.retryable_error_codes)
    }

    /// Check that durations are usable.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(HttpClientError::Config("timeout must be greater than 0".into()));
        }
        if self.base_delay.is_zero() {
            return Err(HttpClientError::Config("base_delay must be greater than 0".into()));
        }
        if self.max_delay < self.base_delay {
            return Err(HttpClientError::Config(format!(
                "max_delay ({:?}) must not be less than base_delay ({:?})",
                self.max_delay, self.base_delay
            )));
        }
        Ok(())
    }

    /// Apply the fields set in `overrides` and validate the result.
    pub fn merge(&self, overrides: &RetryConfigOverride) -> Result<Self> {
        let merged = Self {
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            timeout: overrides.timeout.unwrap_or(self.timeout),
            base_delay: overrides.base_delay.unwrap_or(self.base_delay),
            max_delay: overrides.max_delay.unwrap_or(self.max_delay),
            jitter: overrides.jitter.unwrap_or(self.jitter),
            retryable_statuses: overrides
                .retryable_statuses
                .clone()
                .unwrap_or_else(|| self.retryable_statuses.clone()),
            retryable_error_codes: overrides
                .retryable_error_codes
                .clone()
                .unwrap_or_else(|| self.retryable_error_codes.clone()),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial retry configuration; unset fields keep their value.
///
/// Set fields replace the base value wholesale, including the two sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryConfigOverride {
    /// Override `max_retries`.
    pub max_retries: Option<u32>,
    /// Override `timeout`.
    pub timeout: Option<Duration>,
    /// Override `base_delay`.
    pub base_delay: Option<Duration>,
    /// Override `max_delay`.
    pub max_delay: Option<Duration>,
    /// Override `jitter`.
    pub jitter: Option<bool>,
    /// Override `retryable_statuses`.
    pub retryable_statuses: Option<HashSet<u16>>,
    /// Override `retryable_error_codes`.
    pub retryable_error_codes: Option<HashSet<ErrorCode>>,
}

impl RetryConfigOverride {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Runs an attempt function until it succeeds, fails with a non-retryable
/// error, or runs out of retries.
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    on_retry: Option<RetryHook>,
}

impl RetryExecutor {
    /// Create a new retry executor.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            on_retry: None,
        }
    }

    /// Fire `hook` before every retry.
    pub fn on_retry(mut self, hook: Option<RetryHook>) -> Self {
        self.on_retry = hook;
        self
    }

    /// Get the executor's configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `attempt_fn` with retries.
    ///
    /// `attempt_fn` receives the 0-based attempt index. At most
    /// `max_retries + 1` attempts are made, strictly one after another.
    ///
    /// ```
    /// use resilient_http::{RetryConfig, RetryExecutor, TransportError};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let executor = RetryExecutor::new(
    ///     RetryConfig::exponential(2, Duration::from_millis(1)).without_jitter(),
    /// );
    ///
    /// let value = executor
    ///     .run(|attempt| async move {
    ///         if attempt < 2 {
    ///             Err(TransportError::status(503, "unavailable"))
    ///         } else {
    ///             Ok(attempt)
    ///         }
    ///     })
    ///     .await
    ///     .unwrap();
    ///
    /// assert_eq!(value, 2);
    /// # });
    /// ```
    pub async fn run<F, Fut, T>(&self, mut attempt_fn: F) -> std::result::Result<T, AttemptError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            let error = match attempt_fn(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if attempt >= max_retries {
                if max_retries > 0 {
                    warn!(
                        attempt = attempt + 1,
                        max_retries,
                        error = %error,
                        "Final retry attempt failed"
                    );
                }
                return Err(AttemptError::new(error, attempt + 1));
            }

            if !self.config.is_retryable(&error) {
                debug!(attempt = attempt + 1, error = %error, "Error is not retryable");
                return Err(AttemptError::new(error, attempt + 1));
            }

            let delay = self.config.delay_for_attempt(attempt);
            debug!(
                attempt = attempt + 1,
                delay = ?delay,
                error = %error,
                "Retry attempt failed, waiting before retry"
            );

            if let Some(hook) = &self.on_retry {
                hook(attempt + 1, &error);
            }

            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }

            attempt += 1;
        }
    }
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<hook>"))
            .finish()
    }
}
