//! Pipeline builder composing the policies in their canonical order.
//!
//! Whatever order the builder methods are called in, the built stack is
//!
//! ```text
//! Retry → Timeout → RateLimiter → CircuitBreaker → Protector → action
//! ```
//!
//! so each retry attempt gets a fresh timeout and a fresh permit, the breaker only ever sees
//! converted panics, and a tripped breaker short-circuits the remaining attempts.
//!
//! ```rust
//! use std::time::Duration;
//! use effectors::{effector_fn, CircuitBreakerConfig, Context, EffectorError, Pipeline, Retrier};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pipeline = Pipeline::new(effector_fn(|_ctx| async { Ok::<_, EffectorError>(()) }))
//!     .retry(Retrier::builder().max_retries(2).build())
//!     .timeout(Duration::from_secs(1))
//!     .circuit_breaker(CircuitBreakerConfig::new(5, Duration::from_secs(30)).unwrap())
//!     .rate_limit(100.0)
//!     .protect()
//!     .build();
//! assert!(pipeline.invoke(&Context::new()).await.is_ok());
//! # });
//! ```

use crate::{
    CircuitBreaker, CircuitBreakerConfig, Effector, Protector, RateLimiter, Retrier, RetryLayer,
    SharedEffector, Timeout,
};
use std::sync::Arc;
use std::time::Duration;
use tower_layer::Layer;

/// Builder for a canonical policy stack around one action.
#[derive(Debug, Clone)]
pub struct Pipeline<E> {
    action: E,
    protect: bool,
    circuit_breaker: Option<CircuitBreakerConfig>,
    rate: Option<f64>,
    timeout: Option<Duration>,
    retry: Option<RetryLayer>,
}

impl<E> Pipeline<E>
where
    E: Effector + 'static,
{
    pub fn new(action: E) -> Self {
        Self {
            action,
            protect: false,
            circuit_breaker: None,
            rate: None,
            timeout: None,
            retry: None,
        }
    }

    /// Convert panics into errors.
    pub fn protect(mut self) -> Self {
        self.protect = true;
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    /// Admit at most `rate` calls per second.
    pub fn rate_limit(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Bound each attempt.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn retry(mut self, retrier: Retrier) -> Self {
        self.retry = Some(RetryLayer::new(retrier));
        self
    }

    /// Retry with the process-wide default retrier, read at each invocation.
    pub fn retry_default(mut self) -> Self {
        self.retry = Some(RetryLayer::default());
        self
    }

    pub fn build(self) -> SharedEffector {
        let mut effector: SharedEffector = Arc::new(self.action);
        if self.protect {
            effector = Arc::new(Protector::new(effector));
        }
        if let Some(config) = self.circuit_breaker {
            effector = Arc::new(CircuitBreaker::with_config(config, effector));
        }
        if let Some(rate) = self.rate {
            effector = Arc::new(RateLimiter::new(rate, effector));
        }
        if let Some(duration) = self.timeout {
            effector = Arc::new(Timeout::new(duration, effector));
        }
        if let Some(retry) = self.retry {
            effector = Arc::new(retry.layer(effector));
        }
        effector
    }
}
