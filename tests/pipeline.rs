mod common;

use common::{always_fails, scripted, LogCapture, TestError};
use effectors::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn quick(max_retries: usize) -> Retrier {
    Retrier::builder()
        .max_retries(max_retries)
        .backoff(Backoff::constant(Duration::ZERO))
        .build()
}

#[tokio::test]
async fn retry_retries_inner_errors_then_succeeds() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let action = scripted(attempts.clone(), |n| {
        if n < 2 {
            Err(EffectorError::inner(TestError("flaky")))
        } else {
            Ok(())
        }
    });
    let pipeline = Pipeline::new(action).retry(quick(2)).build();
    pipeline.invoke(&Context::new()).await.unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_triggers_on_slow_operation() {
    let pipeline = Pipeline::new(effector_fn(|_ctx| async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    }))
    .timeout(Duration::from_millis(50))
    .build();
    assert!(pipeline.invoke(&Context::new()).await.unwrap_err().is_deadline_exceeded());
}

#[tokio::test]
async fn circuit_breaker_opens_after_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new(always_fails(calls.clone(), "down"))
        .circuit_breaker(CircuitBreakerConfig::new(1, Duration::from_secs(30)).unwrap())
        .build();
    let ctx = Context::new();

    let tripped = pipeline.invoke(&ctx).await.unwrap_err();
    assert!(tripped.is_circuit_open());
    let second = pipeline.invoke(&ctx).await.unwrap_err();
    assert!(second.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn full_stack_recovers_from_transient_failures() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let action = scripted(attempts.clone(), |n| match n {
        0 => Err(EffectorError::inner(TestError("cold cache"))),
        1 => panic!("driver bug"),
        _ => Ok(()),
    });
    let pipeline = Pipeline::new(action)
        .protect()
        .circuit_breaker(CircuitBreakerConfig::new(5, Duration::from_secs(30)).unwrap())
        .rate_limit(50.0)
        .timeout(Duration::from_secs(1))
        .retry(quick(4))
        .build();
    pipeline.invoke(&Context::new()).await.unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn caller_deadline_caps_the_whole_pipeline() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new(always_fails(calls.clone(), "down"))
        .retry(
            Retrier::builder()
                .max_retries(100)
                .backoff(Backoff::constant(Duration::from_millis(100)))
                .build(),
        )
        .build();
    let ctx = Context::new().with_timeout(Duration::from_millis(350));
    let started = Instant::now();
    let err = pipeline.invoke(&ctx).await.unwrap_err();
    assert!(err.is_deadline_exceeded());
    assert_eq!(started.elapsed(), Duration::from_millis(350));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn policies_log_their_decisions() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new(always_fails(calls, "down"))
        .circuit_breaker(CircuitBreakerConfig::new(2, Duration::from_secs(30)).unwrap())
        .retry(quick(1))
        .build();
    let err = pipeline.invoke(&Context::new()).await.unwrap_err();
    assert!(err.is_circuit_open());

    let _ = RateLimiter::new(-1.0, Noop);

    let output = logs.contents();
    assert!(output.contains("retrying after failure"), "{output}");
    assert!(output.contains("circuit breaker → open"), "{output}");
    assert!(output.contains("retries exhausted"), "{output}");
    assert!(output.contains("rate limiter misconfigured"), "{output}");
}

#[tokio::test]
async fn protector_logs_recovered_panics() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let exploding = effector_fn(|_ctx| async {
        if true {
            panic!("kaboom");
        }
        Ok(())
    });
    assert!(exploding.protected().invoke(&Context::new()).await.unwrap_err().is_panic());
    let output = logs.contents();
    assert!(output.contains("ERROR"), "{output}");
    assert!(output.contains("kaboom"), "{output}");
}

#[tokio::test(start_paused = true)]
async fn composed_with_the_algebra() {
    use tower_layer::Layer;

    let primary_calls = Arc::new(AtomicUsize::new(0));
    let action: SharedEffector = always_fails(primary_calls.clone(), "down").shared();
    let fallback_calls = Arc::new(AtomicUsize::new(0));
    let degraded = scripted(fallback_calls.clone(), |_| Ok(()));

    let resilient = Policy(RetryLayer::new(quick(2))) + Policy(TimeoutLayer::new(Duration::from_secs(1)));
    let guarded = resilient.layer(action).or_else(degraded);

    guarded.invoke(&Context::new()).await.unwrap();
    assert_eq!(primary_calls.load(Ordering::SeqCst), 3);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
}
