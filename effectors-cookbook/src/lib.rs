//! Ready-to-use policy recipes ("cookbook") for effectors.
//! Each function returns a `Policy<Layer>` you can apply to any effector with
//! `tower_layer::Layer::layer`, or combine further with `+` and `|`.
//!
//! **Ladder:**
//! - Simple: [`retry_fast`], [`timeout_p95`], [`circuit_flap_guard`]
//! - Intermediate: [`api_guardrail`]
//! - Advanced: [`reliable_read`]
//! - Starter pack: [`sensible_defaults`]

use std::time::Duration;

use effectors::{
    Backoff, CircuitBreakerConfig, CircuitBreakerLayer, CombinedLayer, ConfigError, FallbackLayer,
    Jitter, Policy, ProtectLayer, RateLimitLayer, Retrier, RetryLayer, TimeoutLayer,
};

/// Simple, fast retry: 3 retries, exponential backoff starting at 50ms, full jitter.
pub fn retry_fast() -> Policy<RetryLayer> {
    Policy(RetryLayer::new(
        Retrier::builder()
            .max_retries(3)
            .backoff(Backoff::exponential(Duration::from_millis(50)))
            .jitter(Jitter::full())
            .build(),
    ))
}

/// Latency guard: per-attempt timeout at 300ms.
pub fn timeout_p95() -> Policy<TimeoutLayer> {
    Policy(TimeoutLayer::new(Duration::from_millis(300)))
}

/// Circuit breaker tuned for flapping services.
pub fn circuit_flap_guard() -> Result<Policy<CircuitBreakerLayer>, ConfigError> {
    let cfg = CircuitBreakerConfig::new(5, Duration::from_secs(5))?;
    Ok(Policy(CircuitBreakerLayer::new(cfg)))
}

/// Reliable read: aggressive attempt then relaxed fallback.
/// Layout: (fast retries + fast timeout) | (generous retries + slow timeout)
pub fn reliable_read() -> Policy<
    FallbackLayer<CombinedLayer<RetryLayer, TimeoutLayer>, CombinedLayer<RetryLayer, TimeoutLayer>>,
> {
    let fast = retry_fast() + timeout_p95();
    let slow = Policy(RetryLayer::new(
        Retrier::builder()
            .max_retries(5)
            .backoff(Backoff::exponential(Duration::from_millis(150)))
            .jitter(Jitter::full())
            .build(),
    )) + Policy(TimeoutLayer::new(Duration::from_secs(2)));

    fast | slow
}

/// API guardrail for external calls: timeout, then rate limit, then breaker.
///
/// The rate limiter's bucket is shared by every effector the returned policy wraps.
pub fn api_guardrail(
    calls_per_second: f64,
) -> Result<
    Policy<CombinedLayer<CombinedLayer<TimeoutLayer, RateLimitLayer>, CircuitBreakerLayer>>,
    ConfigError,
> {
    let timeout = Policy(TimeoutLayer::new(Duration::from_secs(1)));
    let limit = Policy(RateLimitLayer::new(calls_per_second));
    Ok(timeout + limit + circuit_flap_guard()?)
}

/// Starter pack: retry around a per-attempt timeout around a breaker, with panics contained.
pub fn sensible_defaults() -> Result<
    Policy<
        CombinedLayer<
            CombinedLayer<CombinedLayer<RetryLayer, TimeoutLayer>, CircuitBreakerLayer>,
            ProtectLayer,
        >,
    >,
    ConfigError,
> {
    let timeout = Policy(TimeoutLayer::new(Duration::from_secs(1)));
    let breaker = circuit_flap_guard()?;
    Ok(retry_fast() + timeout + breaker + Policy(ProtectLayer))
}
