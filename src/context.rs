//! Execution context threaded through every effector.
//!
//! A [`Context`] carries a cancellation token and an optional deadline. It is cheap to clone and
//! is never mutated in place: layers derive children with [`Context::child`],
//! [`Context::with_timeout`] or [`Context::with_deadline`]. Cancelling a context cancels all of
//! its descendants, never its parent.
//!
//! Deadlines use `tokio::time::Instant`, so paused-clock tests observe them.

use crate::EffectorError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Cancellation and deadline handle passed to [`Effector::invoke`](crate::Effector::invoke).
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Root context: never cancelled unless [`cancel`](Self::cancel) is called, no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context that is cancelled with this one but can also be cancelled on its own.
    pub fn child(&self) -> Self {
        Self { token: self.token.child_token(), deadline: self.deadline }
    }

    /// Derive a child whose deadline is the earlier of `deadline` and the current one.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self { token: self.token.child_token(), deadline: Some(deadline) }
    }

    /// Derive a child that expires `timeout` from now. `Duration::ZERO` yields a context that is
    /// already past its deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            // Too far away to represent; behaves like no extra deadline.
            None => self.child(),
        }
    }

    /// The effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns a guard that cancels this context when dropped, including during unwinding.
    pub fn cancel_on_drop(&self) -> ContextGuard {
        ContextGuard { _guard: self.token.clone().drop_guard() }
    }

    /// True once [`cancel`](Self::cancel) was called on this context or an ancestor.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The error this context would report right now, if it is done.
    pub fn err(&self) -> Option<EffectorError> {
        if self.token.is_cancelled() {
            Some(EffectorError::Canceled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(EffectorError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> EffectorError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => EffectorError::Canceled,
                    _ = sleep_until(deadline) => EffectorError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                EffectorError::Canceled
            }
        }
    }

    /// Race `fut` against this context. The context wins ties, and an already-done context
    /// never polls `fut`.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, EffectorError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }

    /// Sleep for `duration` unless the context fires first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), EffectorError> {
        self.run(tokio::time::sleep(duration)).await
    }
}

/// Cancels its context on drop. Returned by [`Context::cancel_on_drop`].
#[derive(Debug)]
pub struct ContextGuard {
    _guard: DropGuard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn root_context_is_live() {
        let ctx = Context::new();
        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_parent_cancels_child_only_downwards() {
        let parent = Context::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled(), "child cancellation must not leak upwards");

        let other = parent.child();
        parent.cancel();
        assert!(matches!(other.err(), Some(EffectorError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_keeps_the_tighter_deadline() {
        let outer = Context::new().with_timeout(Duration::from_millis(50));
        let inner = outer.with_timeout(Duration::from_secs(10));
        assert_eq!(inner.deadline(), outer.deadline());

        let tighter = outer.with_timeout(Duration::from_millis(10));
        assert!(tighter.deadline() < outer.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_is_already_expired() {
        let ctx = Context::new().with_timeout(Duration::ZERO);
        assert!(matches!(ctx.err(), Some(EffectorError::DeadlineExceeded)));
        let ran = ctx.run(async { 1 }).await;
        assert!(matches!(ran, Err(EffectorError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_interrupted_by_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(100));
        let start = Instant::now();
        let err = ctx.sleep(Duration::from_secs(60)).await.unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_interrupted_by_cancel() {
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let err = ctx.sleep(Duration::from_secs(60)).await.unwrap_err();
        assert!(err.is_canceled());
    }

    #[tokio::test]
    async fn drop_guard_cancels_on_scope_exit() {
        let ctx = Context::new().child();
        {
            let _guard = ctx.cancel_on_drop();
            assert!(!ctx.is_cancelled());
        }
        assert!(ctx.is_cancelled());
    }
}
