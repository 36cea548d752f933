//! Opt-in mutual exclusion for effectors that are not built for concurrent use.
//!
//! The [`CircuitBreaker`](crate::CircuitBreaker) keeps plain counters and assumes a single
//! caller at a time. Wrap it in [`Exclusive`] when several tasks share one instance: calls
//! then run one after another, and a caller whose context fires while queued gives up without
//! invoking the inner effector.

use crate::{Context, Effector, EffectorError};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Serializes invocations of the inner effector.
#[derive(Debug, Default)]
pub struct Exclusive<E> {
    lock: Mutex<()>,
    inner: E,
}

impl<E> Exclusive<E> {
    pub fn new(inner: E) -> Self {
        Self { lock: Mutex::new(()), inner }
    }

    pub fn get_ref(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

#[async_trait]
impl<E> Effector for Exclusive<E>
where
    E: Effector,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        let _turn = ctx.run(self.lock.lock()).await?;
        self.inner.invoke(ctx).await
    }
}
