//! Timeout policy implementation
//!
//! [`Timeout`] derives a child context that expires `duration` from now (or earlier, if the
//! caller's deadline is tighter), invokes the inner effector with it and races the call
//! against that child. When the child fires first the inner future is dropped and the
//! context's error is returned. The child is cancelled on every exit path, including
//! unwinding, so anything the inner effector spawned with it is released.
//!
//! `Duration::ZERO` is an already-expired deadline, never "no timeout".

use crate::{Context, Effector, EffectorError};
use async_trait::async_trait;
use std::time::Duration;
use tower_layer::Layer;

/// Bounds each invocation of the inner effector.
#[derive(Debug, Clone)]
pub struct Timeout<E> {
    duration: Duration,
    inner: E,
}

impl<E> Timeout<E> {
    pub fn new(duration: Duration, inner: E) -> Self {
        Self { duration, inner }
    }

    /// Inspect the configured timeout duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl<E> Effector for Timeout<E>
where
    E: Effector,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        let child = ctx.with_timeout(self.duration);
        let _release = child.cancel_on_drop();
        let result = child.run(self.inner.invoke(&child)).await;
        if let Err(err) = &result {
            tracing::debug!(timeout = ?self.duration, error = %err, "timeout fired");
        }
        result?
    }
}

/// Layer producing [`Timeout`].
#[derive(Debug, Clone, Copy)]
pub struct TimeoutLayer {
    duration: Duration,
}

impl TimeoutLayer {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = Timeout<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Timeout::new(self.duration, inner)
    }
}
