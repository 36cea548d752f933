//! The unit of work every policy wraps.
//!
//! An [`Effector`] is a single async capability: given a [`Context`], succeed or fail with an
//! [`EffectorError`]. Policies are effectors that hold another effector.
//!
//! Absent actions are modelled with `Option<E>`: `None` is a no-op that always succeeds, so any
//! wrapper accepts `None` without special casing. [`Noop`] is the same thing as a named type.

use crate::{Context, EffectorError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A fallible, re-invocable unit of work.
///
/// Implementations must tolerate repeated and concurrent invocation; composition strategies
/// call the same value from several tasks.
#[async_trait]
pub trait Effector: Send + Sync {
    /// Run the action once.
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError>;
}

/// Type-erased effector shared between owners and tasks.
pub type SharedEffector = Arc<dyn Effector>;

/// Effector that does nothing and always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct Noop;

#[async_trait]
impl Effector for Noop {
    async fn invoke(&self, _ctx: &Context) -> Result<(), EffectorError> {
        Ok(())
    }
}

#[async_trait]
impl<E> Effector for Option<E>
where
    E: Effector,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        match self {
            Some(inner) => inner.invoke(ctx).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<E> Effector for Arc<E>
where
    E: Effector + ?Sized,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        (**self).invoke(ctx).await
    }
}

#[async_trait]
impl<E> Effector for Box<E>
where
    E: Effector + ?Sized,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        (**self).invoke(ctx).await
    }
}

/// Effector built from a closure; see [`effector_fn`].
#[derive(Clone)]
pub struct FnEffector<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnEffector<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEffector").finish_non_exhaustive()
    }
}

/// Build an effector from a closure receiving an owned clone of the context.
///
/// ```rust
/// use effectors::{effector_fn, Context, Effector, EffectorError};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let ping = effector_fn(|_ctx: Context| async { Ok::<_, EffectorError>(()) });
/// assert!(ping.invoke(&Context::new()).await.is_ok());
/// # });
/// ```
pub fn effector_fn<F, Fut>(f: F) -> FnEffector<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), EffectorError>> + Send + 'static,
{
    FnEffector { f }
}

#[async_trait]
impl<F, Fut> Effector for FnEffector<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), EffectorError>> + Send + 'static,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        (self.f)(ctx.clone()).await
    }
}

/// Wrapping helpers available on every effector.
pub trait EffectorExt: Effector + Sized {
    /// Erase the type and share it.
    fn shared(self) -> SharedEffector
    where
        Self: 'static,
    {
        Arc::new(self)
    }

    /// Catch panics; see [`Protector`](crate::Protector).
    fn protected(self) -> crate::Protector<Self> {
        crate::Protector::new(self)
    }

    /// Bound each invocation; see [`Timeout`](crate::Timeout).
    fn with_timeout(self, duration: Duration) -> crate::Timeout<Self> {
        crate::Timeout::new(duration, self)
    }

    /// Admit at most `rate` invocations per second; see [`RateLimiter`](crate::RateLimiter).
    fn rate_limited(self, rate: f64) -> crate::RateLimiter<Self> {
        crate::RateLimiter::new(rate, self)
    }

    /// Retry with an explicit configuration; see [`Retrier`](crate::Retrier).
    fn retried_with(self, retrier: &crate::Retrier) -> crate::Retry<Self> {
        retrier.wrap(self)
    }

    /// Run `secondary` when this effector fails; see [`Fallback`](crate::Fallback).
    fn or_else<B: Effector>(self, secondary: B) -> crate::Fallback<Self, B> {
        crate::Fallback::new(self, secondary)
    }
}

impl<E: Effector> EffectorExt for E {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn noop_always_succeeds() {
        assert!(Noop.invoke(&Context::new()).await.is_ok());
    }

    #[tokio::test]
    async fn none_is_a_noop() {
        let absent: Option<SharedEffector> = None;
        assert!(absent.invoke(&Context::new()).await.is_ok());
    }

    #[tokio::test]
    async fn some_delegates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let present = Some(effector_fn(move |_ctx| {
            let calls = counted.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EffectorError::inner("nope"))
            }
        }));
        assert!(present.invoke(&Context::new()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shared_effector_is_reusable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let shared = effector_fn(move |_ctx| {
            let calls = counted.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .shared();
        let ctx = Context::new();
        for _ in 0..3 {
            shared.clone().invoke(&ctx).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn closure_sees_the_callers_context() {
        let ctx = Context::new();
        ctx.cancel();
        let probe = effector_fn(|ctx: Context| async move {
            match ctx.err() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        });
        assert!(probe.invoke(&ctx).await.unwrap_err().is_canceled());
    }
}
