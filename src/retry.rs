//! Retry policy implementation
//!
//! Semantics:
//! - `max_retries` counts retries *after* the first attempt: `N` means at most `N + 1`
//!   invocations.
//! - The wait before retry `k` (zero-based) is `backoff.delay(k)`, passed through the jitter.
//!   The wait races the context; if the context fires the retrier stops and returns the
//!   context's error, not the action's.
//! - Exhaustion returns the error of the **last** attempt.
//! - `should_retry` (default: everything) can stop early; the error is returned unchanged.
//!
//! A process-wide default retrier (3 retries, `2^attempt` seconds) backs [`retry`] and
//! [`RetryLayer::default`]. Reading it is lock-free and safe from any task. The setters are
//! read-modify-write and are **not** safe to call concurrently: call them once during
//! single-threaded setup. Prefer passing an explicit [`Retrier`] where you can.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use effectors::{effector_fn, Backoff, Context, Effector, EffectorError, Retrier};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let retrier = Retrier::builder()
//!     .max_retries(2)
//!     .backoff(Backoff::constant(Duration::from_millis(1)))
//!     .build();
//! let flaky = retrier.wrap(effector_fn(|_ctx| async { Err(EffectorError::inner("nope")) }));
//! assert!(flaky.invoke(&Context::new()).await.is_err());
//! # });
//! ```

use crate::{Backoff, Context, Effector, EffectorError, Jitter};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use tower_layer::Layer;

type RetryPredicate = Arc<dyn Fn(&EffectorError) -> bool + Send + Sync>;

/// Retry configuration: how many retries, how long to wait, which errors qualify.
#[derive(Clone)]
pub struct Retrier {
    max_retries: usize,
    backoff: Backoff,
    jitter: Jitter,
    should_retry: RetryPredicate,
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("should_retry", &"<predicate>")
            .finish()
    }
}

impl Default for Retrier {
    fn default() -> Self {
        RetrierBuilder::new().build()
    }
}

impl Retrier {
    /// Construct a new builder with defaults.
    pub fn builder() -> RetrierBuilder {
        RetrierBuilder::new()
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Wrap `action` with this configuration.
    pub fn wrap<E>(&self, action: E) -> Retry<E> {
        Retry { inner: action, retrier: Some(self.clone()) }
    }

    /// Invoke `action` with retry semantics.
    pub async fn run<E>(&self, action: &E, ctx: &Context) -> Result<(), EffectorError>
    where
        E: Effector + ?Sized,
    {
        let mut attempt = 0;
        loop {
            let err = match action.invoke(ctx).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if !(self.should_retry)(&err) {
                return Err(err);
            }
            if attempt >= self.max_retries {
                tracing::warn!(attempts = attempt + 1, error = %err, "retries exhausted");
                return Err(err);
            }

            let delay = self.jitter.apply(self.backoff.delay(attempt));
            tracing::debug!(attempt = attempt + 1, ?delay, error = %err, "retrying after failure");
            ctx.sleep(delay).await?;
            attempt += 1;
        }
    }
}

/// Builder for [`Retrier`].
pub struct RetrierBuilder {
    max_retries: usize,
    backoff: Backoff,
    jitter: Jitter,
    should_retry: RetryPredicate,
}

impl RetrierBuilder {
    /// 3 retries, exponential backoff from 1s, no jitter, every error retried.
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            jitter: Jitter::None,
            should_retry: Arc::new(|_| true),
        }
    }

    /// Retries after the first attempt. Zero disables retrying.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Predicate deciding whether an error is worth another attempt.
    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EffectorError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    pub fn build(self) -> Retrier {
        Retrier {
            max_retries: self.max_retries,
            backoff: self.backoff,
            jitter: self.jitter,
            should_retry: self.should_retry,
        }
    }
}

impl Default for RetrierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_RETRIER: OnceLock<ArcSwap<Retrier>> = OnceLock::new();

fn default_cell() -> &'static ArcSwap<Retrier> {
    DEFAULT_RETRIER.get_or_init(|| ArcSwap::from_pointee(Retrier::default()))
}

/// Snapshot of the process-wide default retrier.
pub fn default_retrier() -> Arc<Retrier> {
    default_cell().load_full()
}

/// Change the default retry count.
///
/// Not concurrency-safe: two racing setters can lose an update. Call during init only.
pub fn set_default_max_retries(retries: usize) {
    let mut next = Retrier::clone(&default_cell().load());
    next.max_retries = retries;
    default_cell().store(Arc::new(next));
}

/// Change the default backoff.
///
/// Not concurrency-safe: two racing setters can lose an update. Call during init only.
pub fn set_default_backoff(backoff: Backoff) {
    let mut next = Retrier::clone(&default_cell().load());
    next.backoff = backoff;
    default_cell().store(Arc::new(next));
}

/// Replace the default retrier wholesale. Same init-only contract as the other setters.
pub fn set_default_retrier(retrier: Retrier) {
    default_cell().store(Arc::new(retrier));
}

/// Wrap `action` with the default retrier, read at each invocation.
pub fn retry<E>(action: E) -> Retry<E> {
    Retry { inner: action, retrier: None }
}

/// Effector produced by [`Retrier::wrap`] and [`retry`].
#[derive(Debug, Clone)]
pub struct Retry<E> {
    inner: E,
    retrier: Option<Retrier>,
}

#[async_trait]
impl<E> Effector for Retry<E>
where
    E: Effector,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        match &self.retrier {
            Some(retrier) => retrier.run(&self.inner, ctx).await,
            None => default_retrier().run(&self.inner, ctx).await,
        }
    }
}

/// Layer producing [`Retry`]. `RetryLayer::default()` follows the process-wide default.
#[derive(Debug, Clone, Default)]
pub struct RetryLayer {
    retrier: Option<Retrier>,
}

impl RetryLayer {
    pub fn new(retrier: Retrier) -> Self {
        Self { retrier: Some(retrier) }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry { inner, retrier: self.retrier.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError: {}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    /// Fails the first `failures` calls, recording the call count.
    struct Flaky {
        failures: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Effector for Flaky {
        async fn invoke(&self, _ctx: &Context) -> Result<(), EffectorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(EffectorError::inner(TestError(format!("attempt {n}"))))
            } else {
                Ok(())
            }
        }
    }

    fn flaky(failures: usize, calls: Arc<AtomicUsize>) -> Flaky {
        Flaky { failures, calls }
    }

    fn fast(max_retries: usize) -> Retrier {
        Retrier::builder()
            .max_retries(max_retries)
            .backoff(Backoff::constant(Duration::from_millis(10)))
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn success_first_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = fast(3).wrap(flaky(0, calls.clone()));
        policy.invoke(&Context::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "Should only execute once");
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = fast(5).wrap(flaky(2, calls.clone()));
        policy.invoke(&Context::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3, "Should succeed on 3rd attempt");
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = fast(3).wrap(flaky(usize::MAX, calls.clone()));
        let err = policy.invoke(&Context::new()).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.downcast_ref::<TestError>(), Some(&TestError("attempt 3".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = fast(0).wrap(flaky(usize::MAX, calls.clone()));
        assert!(policy.invoke(&Context::new()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_schedule_is_followed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = Retrier::builder()
            .max_retries(3)
            .backoff(Backoff::linear(Duration::from_millis(100)))
            .build()
            .wrap(flaky(usize::MAX, calls.clone()));

        let start = Instant::now();
        let _ = policy.invoke(&Context::new()).await;
        // 100 + 200 + 300
        assert_eq!(start.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn default_backoff_doubles_from_one_second() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = Retrier::builder().max_retries(3).build().wrap(flaky(usize::MAX, calls));
        let start = Instant::now();
        let _ = policy.invoke(&Context::new()).await;
        assert_eq!(start.elapsed(), Duration::from_secs(1 + 2 + 4));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_retrying() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = Retrier::builder()
            .max_retries(5)
            .backoff(Backoff::constant(Duration::from_secs(10)))
            .build()
            .wrap(flaky(usize::MAX, calls.clone()));

        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = policy.invoke(&ctx).await.unwrap_err();
        assert!(err.is_canceled(), "expected the context error, got {err:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_backoff_stops_retrying() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = fast(1_000).wrap(flaky(usize::MAX, calls.clone()));
        let ctx = Context::new().with_timeout(Duration::from_millis(35));
        let err = policy.invoke(&ctx).await.unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn predicate_stops_early() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = Retrier::builder()
            .max_retries(5)
            .should_retry(|err| err.downcast_ref::<TestError>().is_none())
            .build()
            .wrap(flaky(usize::MAX, calls.clone()));
        let err = policy.invoke(&Context::new()).await.unwrap_err();
        assert!(err.downcast_ref::<TestError>().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn jitter_never_exceeds_the_backoff() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = Retrier::builder()
            .max_retries(3)
            .backoff(Backoff::constant(Duration::from_millis(100)))
            .jitter(Jitter::full())
            .build()
            .wrap(flaky(usize::MAX, calls.clone()));
        let start = Instant::now();
        let _ = policy.invoke(&Context::new()).await;
        assert!(start.elapsed() <= Duration::from_millis(300));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn retrying_nothing_is_a_noop() {
        let policy = fast(3).wrap(None::<crate::Noop>);
        assert!(policy.invoke(&Context::new()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn layer_applies_the_configuration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryLayer::new(fast(2)).layer(flaky(usize::MAX, calls.clone()));
        assert!(policy.invoke(&Context::new()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn debug_hides_predicate() {
        let rendered = format!("{:?}", Retrier::default());
        assert!(rendered.contains("max_retries: 3"));
        assert!(rendered.contains("<predicate>"));
    }
}
