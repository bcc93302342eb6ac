//! Circuit breaker pattern implementation.
//!
//! The breaker watches the outcome of every call it wraps and "opens" once
//! `failure_threshold` consecutive calls fail, rejecting further calls
//! without running them until `open_timeout` has elapsed since the last
//! failure.
//!
//! ## States
//!
//! - **Closed**: normal operation, calls pass through
//! - **Open**: calls are rejected with [`CircuitOpenError`]
//! - **Half-Open**: the first call after the open timeout runs as a probe;
//!   `success_threshold` consecutive successes close the circuit, a single
//!   failure opens it again
//!
//! State lives behind one mutex. The admission decision and the outcome
//! bookkeeping are each a single critical section; the lock is never held
//! while the wrapped operation runs, and hooks fire after it is released.

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{CircuitOpenError, HttpClientError, Result};

/// Callback fired on circuit state transitions.
pub type CircuitHook = Arc<dyn Fn() + Send + Sync>;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally.
    Closed,
    /// Circuit is open, requests are rejected.
    Open,
    /// Circuit is half-open, testing recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// When false the breaker passes every call straight through.
    pub enabled: bool,
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Number of consecutive half-open successes needed to close the circuit.
    pub success_threshold: u32,
    /// Time after the last failure before a probe is let through.
    pub open_timeout: Duration,
    /// Number of probes allowed in flight while half-open.
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(60),
            half_open_max_requests: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new circuit breaker config.
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            open_timeout,
            ..Default::default()
        }
    }

    /// A configuration that never trips.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the success threshold to close the circuit.
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the number of concurrent half-open probes.
    pub fn with_half_open_requests(mut self, count: u32) -> Self {
        self.half_open_max_requests = count;
        self
    }

    /// Check that thresholds and timeout are usable.
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(HttpClientError::Config(
                "circuit breaker failure_threshold must be greater than 0".into(),
            ));
        }
        if self.success_threshold == 0 {
            return Err(HttpClientError::Config(
                "circuit breaker success_threshold must be greater than 0".into(),
            ));
        }
        if self.open_timeout.is_zero() {
            return Err(HttpClientError::Config(
                "circuit breaker open_timeout must be greater than 0".into(),
            ));
        }
        if self.half_open_max_requests == 0 {
            return Err(HttpClientError::Config(
                "circuit breaker half_open_max_requests must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Apply the fields set in `overrides` and validate the result.
    pub fn merge(&self, overrides: &CircuitBreakerConfigOverride) -> Result<Self> {
        let merged = Self {
            enabled: overrides.enabled.unwrap_or(self.enabled),
            failure_threshold: overrides.failure_threshold.unwrap_or(self.failure_threshold),
            success_threshold: overrides.success_threshold.unwrap_or(self.success_threshold),
            open_timeout: overrides.open_timeout.unwrap_or(self.open_timeout),
            half_open_max_requests: overrides
                .half_open_max_requests
                .unwrap_or(self.half_open_max_requests),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial circuit breaker configuration; unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitBreakerConfigOverride {
    /// Override `enabled`.
    pub enabled: Option<bool>,
    /// Override `failure_threshold`.
    pub failure_threshold: Option<u32>,
    /// Override `success_threshold`.
    pub success_threshold: Option<u32>,
    /// Override `open_timeout`.
    pub open_timeout: Option<Duration>,
    /// Override `half_open_max_requests`.
    pub half_open_max_requests: Option<u32>,
}

/// Point-in-time copy of the breaker's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSnapshot {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures.
    pub failure_count: u32,
    /// Consecutive half-open successes.
    pub success_count: u32,
    /// When the most recent failure was recorded.
    pub last_failure_time: Option<Instant>,
}

/// Circuit breaker statistics.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Current state.
    pub state: CircuitState,
    /// Calls that were let through.
    pub total_requests: u64,
    /// Calls that succeeded.
    pub total_successes: u64,
    /// Calls that failed.
    pub total_failures: u64,
    /// Calls rejected without running.
    pub total_rejections: u64,
    /// Current consecutive failure count.
    pub current_failure_count: u32,
}

impl CircuitBreakerStats {
    /// Calculate success rate (0.0 - 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.total_successes as f64 / self.total_requests as f64
        }
    }

    /// Calculate failure rate (0.0 - 1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_requests as f64
        }
    }
}

struct CircuitInner {
    config: CircuitBreakerConfig,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    half_open_in_flight: u32,
    // Bumped on every transition so stale probes don't release new slots.
    generation: u64,
}

impl CircuitInner {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            half_open_in_flight: 0,
            generation: 0,
        }
    }

    fn transition(&mut self, state: CircuitState) {
        self.state = state;
        self.half_open_in_flight = 0;
        self.generation += 1;
    }

    fn admit(&mut self) -> Admission {
        if !self.config.enabled {
            return Admission::Bypass;
        }

        if self.state == CircuitState::Open {
            let elapsed = self
                .last_failure_time
                .map(|t| t.elapsed())
                .unwrap_or(Duration::MAX);
            if elapsed < self.config.open_timeout {
                return Admission::Rejected;
            }
            debug!("Circuit breaker transitioning to HALF-OPEN");
            self.transition(CircuitState::HalfOpen);
            self.success_count = 0;
        }

        match self.state {
            CircuitState::Closed => Admission::Granted { probe: None },
            CircuitState::HalfOpen if self.half_open_in_flight < self.config.half_open_max_requests => {
                self.half_open_in_flight += 1;
                Admission::Granted {
                    probe: Some(self.generation),
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => Admission::Rejected,
        }
    }

    /// `half_open_call` is true only for calls admitted since the
    /// circuit last entered half-open.
    fn on_success(&mut self, half_open_call: bool) -> Option<CircuitState> {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
                None
            }
            CircuitState::HalfOpen if !half_open_call => {
                // Admitted before the circuit opened; says nothing about recovery.
                debug!("Stale success recorded while half-open, ignoring");
                None
            }
            CircuitState::HalfOpen => {
                self.failure_count = 0;
                self.success_count += 1;
                if self.success_count >= self.config.success_threshold {
                    self.success_count = 0;
                    self.transition(CircuitState::Closed);
                    Some(CircuitState::Closed)
                } else {
                    None
                }
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late.
                debug!("Success recorded while circuit open, ignoring");
                None
            }
        }
    }

    fn on_failure(&mut self) -> Option<CircuitState> {
        self.failure_count = self.failure_count.saturating_add(1);
        self.success_count = 0;
        self.last_failure_time = Some(Instant::now());

        match self.state {
            CircuitState::Closed if self.failure_count >= self.config.failure_threshold => {
                self.transition(CircuitState::Open);
                Some(CircuitState::Open)
            }
            CircuitState::HalfOpen => {
                self.transition(CircuitState::Open);
                Some(CircuitState::Open)
            }
            CircuitState::Closed | CircuitState::Open => None,
        }
    }
}

enum Admission {
    Bypass,
    Rejected,
    Granted { probe: Option<u64> },
}

/// Circuit breaker for protecting against cascade failures.
///
/// One breaker is meant to be shared by every call to the same logical
/// target, so that their outcomes accumulate into a single health signal.
pub struct CircuitBreaker {
    inner: Mutex<CircuitInner>,
    on_open: Option<CircuitHook>,
    on_close: Option<CircuitHook>,
    total_requests: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(CircuitInner::new(config)),
            on_open: None,
            on_close: None,
            total_requests: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    /// Fire `hook` every time the circuit opens.
    pub fn on_open(mut self, hook: CircuitHook) -> Self {
        self.on_open = Some(hook);
        self
    }

    /// Fire `hook` every time the circuit closes after recovering.
    pub fn on_close(mut self, hook: CircuitHook) -> Self {
        self.on_close = Some(hook);
        self
    }

    /// Run `operation` under circuit breaker protection.
    ///
    /// While the circuit is open the operation is not invoked and the call
    /// fails with [`CircuitOpenError`]. Otherwise the operation's outcome is
    /// recorded and returned unchanged.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        let admission = self.inner.lock().admit();

        let permit = match admission {
            Admission::Bypass => return operation().await,
            Admission::Rejected => {
                self.total_rejections.fetch_add(1, Ordering::Relaxed);
                debug!("Circuit breaker rejected request");
                return Err(CircuitOpenError.into());
            }
            Admission::Granted { probe } => Permit {
                breaker: self,
                probe,
                completed: false,
            },
        };

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let result = operation().await;
        permit.complete(result.is_ok());
        result
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Copy of the current state and counters.
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock();
        CircuitBreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_time: inner.last_failure_time,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> CircuitBreakerConfig {
        self.inner.lock().config.clone()
    }

    /// Replace the configuration used for future decisions.
    pub fn update_config(&self, config: CircuitBreakerConfig) {
        self.inner.lock().config = config;
    }

    /// Force the circuit closed and clear all counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.transition(CircuitState::Closed);
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure_time = None;
    }

    /// Get circuit breaker statistics.
    pub fn stats(&self) -> CircuitBreakerStats {
        let snapshot = self.snapshot();
        CircuitBreakerStats {
            state: snapshot.state,
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
            current_failure_count: snapshot.failure_count,
        }
    }

    fn record(&self, success: bool, probe: Option<u64>) {
        let (transition, failures) = {
            let mut inner = self.inner.lock();
            let half_open_call = probe == Some(inner.generation);
            if half_open_call {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
            }
            if !inner.config.enabled {
                return;
            }
            let transition = if success {
                inner.on_success(half_open_call)
            } else {
                inner.on_failure()
            };
            (transition, inner.failure_count)
        };

        if success {
            self.total_successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_failures.fetch_add(1, Ordering::Relaxed);
        }

        match transition {
            Some(CircuitState::Open) => {
                warn!(failures, "Circuit breaker OPENED");
                if let Some(hook) = &self.on_open {
                    hook();
                }
            }
            Some(CircuitState::Closed) => {
                info!("Circuit breaker CLOSED");
                if let Some(hook) = &self.on_close {
                    hook();
                }
            }
            Some(CircuitState::HalfOpen) | None => {}
        }
    }

    fn release_probe(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("snapshot", &self.snapshot())
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

/// Admission ticket held while a call runs.
///
/// Dropping it without completing (the caller cancelled the call) frees the
/// half-open probe slot without recording an outcome.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: Option<u64>,
    completed: bool,
}

impl Permit<'_> {
    fn complete(mut self, success: bool) {
        self.completed = true;
        self.breaker.record(success, self.probe);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.completed
            && let Some(generation) = self.probe
        {
            self.breaker.release_probe(generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicU32;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Open,
        Failed,
    }

    impl From<CircuitOpenError> for TestError {
        fn from(_: CircuitOpenError) -> Self {
            Self::Open
        }
    }

    async fn fail(cb: &CircuitBreaker) -> std::result::Result<(), TestError> {
        cb.execute(|| async { Err(TestError::Failed) }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> std::result::Result<(), TestError> {
        cb.execute(|| async { Ok(()) }).await
    }

    fn counter() -> (Arc<AtomicU32>, CircuitHook) {
        let count = Arc::new(AtomicU32::new(0));
        let hook_count = count.clone();
        let hook: CircuitHook = Arc::new(move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        });
        (count, hook)
    }

    fn config(failures: u32, successes: u32, open_timeout: Duration) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(failures, open_timeout).with_success_threshold(successes)
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_opens_after_failures() {
        let cb = CircuitBreaker::new(config(3, 2, Duration::from_secs(30)));

        assert_eq!(cb.state(), CircuitState::Closed);

        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 2);

        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.snapshot().last_failure_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_rejects_when_open_without_running() {
        let cb = CircuitBreaker::new(config(1, 1, Duration::from_secs(30)));
        fail(&cb).await.unwrap_err();

        let calls = AtomicU32::new(0);
        let result: std::result::Result<(), TestError> = cb
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(result, Err(TestError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cb.stats().total_rejections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_success_resets_count() {
        let cb = CircuitBreaker::new(config(3, 1, Duration::from_secs(30)));

        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.snapshot().failure_count, 2);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.snapshot().failure_count, 0);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_half_open_recovers() {
        let (closed, on_close) = counter();
        let cb = CircuitBreaker::new(config(2, 2, Duration::from_secs(10))).on_close(on_close);

        fail(&cb).await.unwrap_err();
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(succeed(&cb).await, Err(TestError::Open));

        tokio::time::advance(Duration::from_secs(1)).await;
        succeed(&cb).await.unwrap();
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::HalfOpen);
        assert_eq!(snapshot.success_count, 1);
        assert_eq!(snapshot.failure_count, 0);

        succeed(&cb).await.unwrap();
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.success_count, 0);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let (opened, on_open) = counter();
        let cb = CircuitBreaker::new(config(1, 3, Duration::from_secs(5))).on_open(on_open);

        fail(&cb).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(5)).await;

        succeed(&cb).await.unwrap();
        assert_eq!(cb.snapshot().success_count, 1);

        assert_eq!(fail(&cb).await, Err(TestError::Failed));
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.success_count, 0);
        assert_eq!(opened.load(Ordering::SeqCst), 2);

        // The open timeout is re-armed from the half-open failure.
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(succeed(&cb).await, Err(TestError::Open));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_hook_fires_once_per_transition() {
        let (opened, on_open) = counter();
        let cb = CircuitBreaker::new(config(2, 1, Duration::from_secs(30))).on_open(on_open);

        let slow_failure = || async {
            tokio::task::yield_now().await;
            Err::<(), _>(TestError::Failed)
        };
        let (a, b, c) = tokio::join!(
            cb.execute(slow_failure),
            cb.execute(slow_failure),
            cb.execute(slow_failure)
        );

        assert_eq!((a, b, c), (Err(TestError::Failed), Err(TestError::Failed), Err(TestError::Failed)));
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        for _ in 0..5 {
            assert_eq!(fail(&cb).await, Err(TestError::Open));
        }
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_probe() {
        let cb = CircuitBreaker::new(config(1, 1, Duration::from_secs(10)));
        fail(&cb).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(10)).await;

        let slow_success = || async {
            tokio::task::yield_now().await;
            Ok::<(), TestError>(())
        };
        let (first, second) = tokio::join!(cb.execute(slow_success), cb.execute(slow_success));

        assert_eq!(first, Ok(()));
        assert_eq!(second, Err(TestError::Open));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_success_does_not_close_half_open_circuit() {
        let (closed, on_close) = counter();
        let cb = CircuitBreaker::new(config(1, 1, Duration::from_secs(10))).on_close(on_close);

        let (stale_tx, stale_rx) = tokio::sync::oneshot::channel::<()>();
        let mut stale = Box::pin(cb.execute(move || async move {
            let _ = stale_rx.await;
            Ok::<(), TestError>(())
        }));
        assert!((&mut stale).now_or_never().is_none());

        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(10)).await;

        let (next_tx, next_rx) = tokio::sync::oneshot::channel::<()>();
        let mut next_call = Box::pin(cb.execute(move || async move {
            let _ = next_rx.await;
            Ok::<(), TestError>(())
        }));
        assert!((&mut next_call).now_or_never().is_none());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        stale_tx.send(()).unwrap();
        assert_eq!(stale.await, Ok(()));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.snapshot().success_count, 0);
        assert_eq!(closed.load(Ordering::SeqCst), 0);

        next_tx.send(()).unwrap();
        assert_eq!(next_call.await, Ok(()));
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_probe_frees_slot() {
        let cb = CircuitBreaker::new(config(1, 1, Duration::from_secs(10)));
        fail(&cb).await.unwrap_err();
        tokio::time::advance(Duration::from_secs(10)).await;

        let pending = cb
            .execute(|| std::future::pending::<std::result::Result<(), TestError>>())
            .now_or_never();
        assert!(pending.is_none());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_everything() {
        let cb = CircuitBreaker::new(config(1, 1, Duration::from_secs(10)));
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(
            cb.snapshot(),
            CircuitBreakerSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
            }
        );
        succeed(&cb).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_stable() {
        let cb = CircuitBreaker::new(config(3, 1, Duration::from_secs(10)));
        fail(&cb).await.unwrap_err();

        let first = cb.snapshot();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(cb.snapshot(), first);
        assert_eq!(cb.snapshot(), first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_breaker_never_trips() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::disabled()
        });

        for _ in 0..100 {
            assert_eq!(fail(&cb).await, Err(TestError::Failed));
            let snapshot = cb.snapshot();
            assert_eq!(snapshot.state, CircuitState::Closed);
            assert_eq!(snapshot.failure_count, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_config_applies_to_future_calls() {
        let cb = CircuitBreaker::new(config(5, 1, Duration::from_secs(10)));
        fail(&cb).await.unwrap_err();

        cb.update_config(config(2, 1, Duration::from_secs(10)));
        fail(&cb).await.unwrap_err();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_config_merge_and_validate() {
        let base = CircuitBreakerConfig::default();
        let merged = base
            .merge(&CircuitBreakerConfigOverride {
                failure_threshold: Some(10),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(merged.failure_threshold, 10);
        assert_eq!(merged.success_threshold, base.success_threshold);
        assert_eq!(merged.open_timeout, base.open_timeout);

        let invalid = base.merge(&CircuitBreakerConfigOverride {
            open_timeout: Some(Duration::ZERO),
            ..Default::default()
        });
        assert!(matches!(invalid, Err(HttpClientError::Config(_))));
    }

    #[test]
    fn test_stats_rates() {
        let stats = CircuitBreakerStats {
            state: CircuitState::Closed,
            total_requests: 4,
            total_successes: 3,
            total_failures: 1,
            total_rejections: 0,
            current_failure_count: 0,
        };
        assert_eq!(stats.success_rate(), 0.75);
        assert_eq!(stats.failure_rate(), 0.25);
    }
}
