//! Minimal, focused retry example with backoff, jitter, and a `should_retry` predicate.

use effectors::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
enum MyError {
    Retryable(&'static str),
    Fatal(&'static str),
}

impl fmt::Display for MyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MyError::Retryable(msg) => write!(f, "retryable: {}", msg),
            MyError::Fatal(msg) => write!(f, "fatal: {}", msg),
        }
    }
}

impl std::error::Error for MyError {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG).init();
    println!("=== effectors: retry-only example ===\n");

    // 3 retries, exponential backoff from 50ms, full jitter, retry only on Retryable.
    let retrier = Retrier::builder()
        .max_retries(3)
        .backoff(Backoff::exponential(Duration::from_millis(50)))
        .jitter(Jitter::full())
        .should_retry(|err| matches!(err.downcast_ref::<MyError>(), Some(MyError::Retryable(_))))
        .build();

    let attempt = Arc::new(AtomicUsize::new(0));
    let counter = attempt.clone();
    let flaky = retrier.wrap(effector_fn(move |_ctx| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            match n {
                0 | 1 => Err(EffectorError::inner(MyError::Retryable("transient upstream"))),
                _ => Ok(()),
            }
        }
    }));

    println!("Calling flaky effector (should succeed after retries)...");
    flaky.invoke(&Context::new()).await?;
    println!("✓ succeeded on attempt {}", attempt.load(Ordering::SeqCst));

    let fatal = retrier.wrap(effector_fn(|_ctx| async {
        Err(EffectorError::inner(MyError::Fatal("do not retry")))
    }));
    println!("\nCalling fatal path (should NOT retry)...");
    if let Err(err) = fatal.invoke(&Context::new()).await {
        println!("✗ fatal error returned immediately: {}", err);
    }

    Ok(())
}
