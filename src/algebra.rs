//! Algebraic composition operators for effector layers.
//!
//! - `Policy(A) + Policy(B)`: nesting, `A` wraps `B`.
//! - `Policy(A) | Policy(B)`: fallback, run the `A` stack and on failure the `B` stack.
//!
//! # Operator Precedence
//!
//! `+` binds tighter than `|`, so `A | B + C` is `A | (B + C)`:
//! ```text
//! Policy(A) | Policy(B) + Policy(C)
//! // Try A(action); on failure run B(C(action))
//! ```
//! Use parentheses for anything else: `(Policy(A) | Policy(B)) + Policy(C)`.
//!
//! # Examples
//!
//! ```
//! use effectors::prelude::*;
//! use std::time::Duration;
//! use tower_layer::Layer;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let fast = Policy(TimeoutLayer::new(Duration::from_millis(50)));
//! let careful = Policy(RetryLayer::new(Retrier::builder().max_retries(2).build()))
//!     + Policy(TimeoutLayer::new(Duration::from_secs(5)));
//! let policy = fast | careful;
//!
//! let action = effector_fn(|_ctx| async { Ok::<_, EffectorError>(()) });
//! let guarded = policy.layer(action);
//! assert!(guarded.invoke(&Context::new()).await.is_ok());
//! # });
//! ```

use crate::{Context, Effector, EffectorError};
use async_trait::async_trait;
use std::ops::{Add, BitOr};
use tower_layer::Layer;

/// Opt-in wrapper enabling algebraic composition of layers.
#[derive(Clone, Copy, Debug)]
pub struct Policy<L>(pub L);

impl<S, L> Layer<S> for Policy<L>
where
    L: Layer<S>,
{
    type Service = L::Service;
    fn layer(&self, service: S) -> Self::Service {
        self.0.layer(service)
    }
}

/// Nesting layer: `outer(inner(action))`. Built by `Policy(A) + Policy(B)`.
#[derive(Clone, Copy, Debug)]
pub struct CombinedLayer<A, B> {
    pub outer: A,
    pub inner: B,
}

impl<L1, L2> Add<Policy<L2>> for Policy<L1> {
    type Output = Policy<CombinedLayer<L1, L2>>;
    fn add(self, rhs: Policy<L2>) -> Self::Output {
        Policy(CombinedLayer { outer: self.0, inner: rhs.0 })
    }
}

impl<S, A, B> Layer<S> for CombinedLayer<A, B>
where
    B: Layer<S>,
    A: Layer<B::Service>,
{
    type Service = A::Service;
    fn layer(&self, service: S) -> Self::Service {
        self.outer.layer(self.inner.layer(service))
    }
}

/// Fallback layer. Built by `Policy(A) | Policy(B)`.
///
/// Both stacks wrap their own clone of the action, so the action must be `Clone`
/// (a [`SharedEffector`](crate::SharedEffector) always is).
#[derive(Clone, Debug)]
pub struct FallbackLayer<A, B> {
    pub primary: A,
    pub secondary: B,
}

impl<L1, L2> BitOr<Policy<L2>> for Policy<L1> {
    type Output = Policy<FallbackLayer<L1, L2>>;
    fn bitor(self, rhs: Policy<L2>) -> Self::Output {
        Policy(FallbackLayer { primary: self.0, secondary: rhs.0 })
    }
}

impl<S, A, B> Layer<S> for FallbackLayer<A, B>
where
    S: Clone,
    A: Layer<S>,
    B: Layer<S>,
{
    type Service = Fallback<A::Service, B::Service>;

    fn layer(&self, service: S) -> Self::Service {
        let primary = self.primary.layer(service.clone());
        let secondary = self.secondary.layer(service);
        Fallback::new(primary, secondary)
    }
}

/// Runs `primary`; when it fails, runs `secondary` and returns its outcome.
///
/// The secondary is not started if the context is already done; the context's error is
/// returned instead.
#[derive(Clone, Debug)]
pub struct Fallback<A, B> {
    primary: A,
    secondary: B,
}

impl<A, B> Fallback<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl<A, B> Effector for Fallback<A, B>
where
    A: Effector,
    B: Effector,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        let err = match self.primary.invoke(ctx).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        if let Some(done) = ctx.err() {
            return Err(done);
        }
        tracing::debug!(error = %err, "primary failed, running fallback");
        self.secondary.invoke(ctx).await
    }
}
