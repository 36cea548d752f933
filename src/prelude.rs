//! Convenient re-exports for common effectors types.
pub use crate::{
    algebra::{CombinedLayer, Fallback, FallbackLayer, Policy},
    backoff::{Backoff, BackoffError},
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerLayer, CircuitState},
    compose::{Parallel, ParallelAll, Sequential, SequentialAll},
    context::Context,
    effector::{effector_fn, Effector, EffectorExt, Noop, SharedEffector},
    error::{BoxError, EffectorError},
    exclusive::Exclusive,
    jitter::Jitter,
    protector::{ProtectLayer, Protector},
    rate_limit::{RateLimitLayer, RateLimiter},
    retry::{retry, Retrier, RetryLayer},
    stack::Pipeline,
    timeout::{Timeout, TimeoutLayer},
};
