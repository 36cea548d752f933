//! Fan-out strategies over several effectors.
//!
//! | strategy          | runs             | on failure                                   |
//! |-------------------|------------------|----------------------------------------------|
//! | [`Parallel`]      | concurrently     | cancels siblings, returns the first error    |
//! | [`ParallelAll`]   | concurrently     | waits for everyone, joins every error        |
//! | [`Sequential`]    | in order         | stops, later actions never start             |
//! | [`SequentialAll`] | in order         | keeps going, joins every error               |
//!
//! "First error" for [`Parallel`] means the first one the coordinator observes; when several
//! actions fail close together which one wins is not specified. Sibling cancellation is
//! advisory: siblings see their context cancelled but keep running (detached) until they
//! notice. Each parallel action runs on its own tokio task, so a panic in one is reported as
//! [`EffectorError::Panicked`] rather than tearing down the caller.

use crate::protector::panic_to_error;
use crate::{Context, Effector, EffectorError, SharedEffector};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};

macro_rules! strategy {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default)]
        pub struct $name {
            actions: Vec<SharedEffector>,
        }

        impl $name {
            pub fn new<I>(actions: I) -> Self
            where
                I: IntoIterator<Item = SharedEffector>,
            {
                Self { actions: actions.into_iter().collect() }
            }

            /// Append an action.
            pub fn push<E>(mut self, action: E) -> Self
            where
                E: Effector + 'static,
            {
                self.actions.push(Arc::new(action));
                self
            }

            pub fn len(&self) -> usize {
                self.actions.len()
            }

            pub fn is_empty(&self) -> bool {
                self.actions.is_empty()
            }
        }

        impl FromIterator<SharedEffector> for $name {
            fn from_iter<I: IntoIterator<Item = SharedEffector>>(iter: I) -> Self {
                Self::new(iter)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).field("actions", &self.actions.len()).finish()
            }
        }
    };
}

strategy! {
    /// Run every action concurrently; fail fast on the first observed error.
    Parallel
}

strategy! {
    /// Run every action concurrently and join all of their errors.
    ParallelAll
}

strategy! {
    /// Run actions in order, stopping at the first error.
    Sequential
}

strategy! {
    /// Run every action in order and join all of their errors.
    SequentialAll
}

fn spawn_all(actions: &[SharedEffector], ctx: &Context) -> Vec<JoinHandle<Result<(), EffectorError>>> {
    actions
        .iter()
        .map(|action| {
            let action = action.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { action.invoke(&ctx).await })
        })
        .collect()
}

fn flatten(joined: Result<Result<(), EffectorError>, JoinError>) -> Result<(), EffectorError> {
    match joined {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(panic_to_error(err.into_panic())),
        Err(_) => Err(EffectorError::Canceled),
    }
}

#[async_trait]
impl Effector for Parallel {
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        let shared = ctx.child();
        // Siblings are told to stop on every exit path, including this future being dropped.
        let _cancel_siblings = shared.cancel_on_drop();
        let mut running: FuturesUnordered<_> = spawn_all(&self.actions, &shared).into_iter().collect();
        while let Some(joined) = running.next().await {
            if let Err(err) = flatten(joined) {
                tracing::debug!(error = %err, remaining = running.len(), "parallel action failed");
                return Err(err);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Effector for ParallelAll {
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        let handles = spawn_all(&self.actions, ctx);
        let errors: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| flatten(joined).err())
            .collect();
        EffectorError::join(errors).map_or(Ok(()), Err)
    }
}

#[async_trait]
impl Effector for Sequential {
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        for action in &self.actions {
            action.invoke(ctx).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Effector for SequentialAll {
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        let mut errors = Vec::new();
        for action in &self.actions {
            if let Err(err) = action.invoke(ctx).await {
                errors.push(err);
            }
        }
        EffectorError::join(errors).map_or(Ok(()), Err)
    }
}
