//! Circuit breaker.
//!
//! Rule evaluated on every invocation:
//!
//! 1. If `failure_count >= max_failures` and less than `reset_timeout` has passed since the last
//!    failure, return [`EffectorError::CircuitOpen`] without calling the inner effector.
//! 2. Otherwise call it. Success resets `failure_count` to 0. Failure increments it and stamps
//!    the failure time; once the count reaches `max_failures` the failure is reported as
//!    `CircuitOpen` (the original error becomes its source).
//!
//! There is no stored half-open state: after `reset_timeout` the next call simply goes through
//! and its outcome decides whether the breaker closes or stays open with a fresh timestamp.
//! [`CircuitState::HalfOpen`] is only reported by [`CircuitBreaker::state`] for that window.
//!
//! # Concurrency
//!
//! A breaker is meant for one caller at a time. The counters are plain relaxed atomics with no
//! lock and no atomicity across the check-call-update sequence, so concurrent invocations of one
//! instance can over- or under-count failures. Wrap a shared breaker in
//! [`Exclusive`](crate::Exclusive) (or your own lock) to serialize it.

use crate::clock::{Clock, MonotonicClock};
use crate::{Context, Effector, EffectorError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_layer::Layer;

/// Observed state of a breaker. Derived from the counters on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// The reset timeout elapsed; the next call is let through as a probe.
    HalfOpen,
}

/// Errors produced when validating breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `max_failures` must be > 0.
    #[error("max_failures must be > 0 (got {0})")]
    InvalidMaxFailures(usize),
    /// `reset_timeout` must be > 0.
    #[error("reset_timeout must be > 0 (got {0:?})")]
    InvalidResetTimeout(Duration),
}

/// Validated configuration for the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    max_failures: usize,
    reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Create a config with validation.
    pub fn new(max_failures: usize, reset_timeout: Duration) -> Result<Self, ConfigError> {
        if max_failures == 0 {
            return Err(ConfigError::InvalidMaxFailures(max_failures));
        }
        if reset_timeout.is_zero() {
            return Err(ConfigError::InvalidResetTimeout(reset_timeout));
        }
        Ok(Self { max_failures, reset_timeout })
    }

    /// Consecutive failures that open the circuit.
    pub fn max_failures(&self) -> usize {
        self.max_failures
    }

    /// Time after the last failure before a probe is let through.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    fn reset_timeout_millis(&self) -> u64 {
        u64::try_from(self.reset_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Failure-counting gate around an inner effector.
#[derive(Debug)]
pub struct CircuitBreaker<E> {
    inner: E,
    config: CircuitBreakerConfig,
    failure_count: AtomicUsize,
    last_failure_millis: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl<E> CircuitBreaker<E> {
    /// Create a breaker, validating `max_failures` and `reset_timeout`.
    ///
    /// ```
    /// use effectors::{CircuitBreaker, Noop};
    /// use std::time::Duration;
    /// let breaker = CircuitBreaker::new(5, Duration::from_secs(30), Noop).unwrap();
    /// ```
    pub fn new(max_failures: usize, reset_timeout: Duration, inner: E) -> Result<Self, ConfigError> {
        Ok(Self::with_config(CircuitBreakerConfig::new(max_failures, reset_timeout)?, inner))
    }

    /// Create a breaker from an already validated config.
    pub fn with_config(config: CircuitBreakerConfig, inner: E) -> Self {
        Self {
            inner,
            config,
            failure_count: AtomicUsize::new(0),
            last_failure_millis: AtomicU64::new(0),
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub(crate) fn with_shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Consecutive failures currently recorded.
    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Snapshot of the breaker state as the next invocation would see it.
    pub fn state(&self) -> CircuitState {
        if self.failure_count() < self.config.max_failures {
            return CircuitState::Closed;
        }
        if self.since_last_failure() < self.config.reset_timeout_millis() {
            CircuitState::Open
        } else {
            CircuitState::HalfOpen
        }
    }

    fn since_last_failure(&self) -> u64 {
        let last = self.last_failure_millis.load(Ordering::Relaxed);
        self.clock.now_millis().saturating_sub(last)
    }

    fn retry_in(&self) -> Duration {
        let remaining = self.config.reset_timeout_millis().saturating_sub(self.since_last_failure());
        Duration::from_millis(remaining)
    }
}

#[async_trait]
impl<E> Effector for CircuitBreaker<E>
where
    E: Effector,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        let failures = self.failure_count.load(Ordering::Relaxed);
        if failures >= self.config.max_failures {
            if self.since_last_failure() < self.config.reset_timeout_millis() {
                return Err(EffectorError::CircuitOpen {
                    failures,
                    retry_in: self.retry_in(),
                    source: None,
                });
            }
            tracing::debug!(failures, "circuit breaker: reset timeout elapsed, probing");
        }

        match self.inner.invoke(ctx).await {
            Ok(()) => {
                if self.failure_count.swap(0, Ordering::Relaxed) >= self.config.max_failures {
                    tracing::info!("circuit breaker → closed");
                }
                Ok(())
            }
            Err(err) => {
                let failures = self.failure_count.load(Ordering::Relaxed).saturating_add(1);
                self.failure_count.store(failures, Ordering::Relaxed);
                self.last_failure_millis.store(self.clock.now_millis(), Ordering::Relaxed);

                if failures < self.config.max_failures {
                    return Err(err);
                }
                if failures == self.config.max_failures {
                    tracing::info!(
                        failures,
                        max_failures = self.config.max_failures,
                        error = %err,
                        "circuit breaker → open"
                    );
                } else {
                    tracing::warn!(failures, error = %err, "circuit breaker: probe failed, staying open");
                }
                Err(EffectorError::CircuitOpen {
                    failures,
                    retry_in: self.config.reset_timeout,
                    source: Some(Box::new(err)),
                })
            }
        }
    }
}

/// Layer producing a fresh [`CircuitBreaker`] (with its own counters) per wrapped effector.
#[derive(Debug, Clone)]
pub struct CircuitBreakerLayer {
    config: CircuitBreakerConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl CircuitBreakerLayer {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, clock: None }
    }

    /// Use `clock` for every breaker this layer builds.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreaker<S>;

    fn layer(&self, inner: S) -> Self::Service {
        let breaker = CircuitBreaker::with_config(self.config, inner);
        match &self.clock {
            Some(clock) => breaker.with_shared_clock(clock.clone()),
            None => breaker,
        }
    }
}
