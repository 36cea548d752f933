#![forbid(unsafe_code)]

//! # effectors
//!
//! Composable resilience policies around a unit of fallible async work.
//!
//! An [`Effector`] is one action: given a [`Context`] (cancellation + optional deadline) it
//! succeeds or fails with an [`EffectorError`]. Every policy is itself an effector wrapping
//! another one, so pipelines are plain nesting:
//!
//! - [`Protector`]: turns panics into errors
//! - [`CircuitBreaker`]: short-circuits after repeated failures
//! - [`RateLimiter`]: token bucket, burst of one
//! - [`Timeout`]: bounds each invocation with a derived deadline
//! - [`Retrier`] / [`retry`]: re-invokes with a cancellable backoff
//! - [`Parallel`], [`Sequential`] (and their join-all variants): fan-out
//!
//! [`Pipeline`] assembles the canonical stack, and [`Policy`] composes layers with `+`
//! (nesting) and `|` (fallback).
//!
//! ## Quick Start
//!
//! ```rust
//! use effectors::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetch = effector_fn(|ctx: Context| async move {
//!         // Your async operation here, honouring `ctx`.
//!         ctx.run(async { /* call the backend */ }).await
//!     });
//!
//!     let guarded = Pipeline::new(fetch)
//!         .protect()
//!         .timeout(Duration::from_secs(2))
//!         .retry(Retrier::builder().max_retries(3).build())
//!         .build();
//!
//!     guarded.invoke(&Context::new()).await.unwrap();
//! }
//! ```

pub mod algebra;
pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod compose;
pub mod context;
pub mod effector;
pub mod error;
pub mod exclusive;
pub mod jitter;
pub mod prelude;
pub mod protector;
pub mod rate_limit;
pub mod retry;
pub mod service;
pub mod stack;
pub mod timeout;

// Re-exports
pub use algebra::{CombinedLayer, Fallback, FallbackLayer, Policy};
pub use backoff::{Backoff, BackoffError, MAX_BACKOFF};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerLayer, CircuitState, ConfigError,
};
pub use clock::{Clock, MonotonicClock};
pub use compose::{Parallel, ParallelAll, Sequential, SequentialAll};
pub use context::{Context, ContextGuard};
pub use effector::{effector_fn, Effector, EffectorExt, FnEffector, Noop, SharedEffector};
pub use error::{BoxError, EffectorError};
pub use exclusive::Exclusive;
pub use jitter::Jitter;
pub use protector::{ProtectLayer, Protector};
pub use rate_limit::{RateLimitLayer, RateLimiter, TokenBucket};
pub use retry::{
    default_retrier, retry, set_default_backoff, set_default_max_retries, set_default_retrier,
    Retrier, RetrierBuilder, Retry, RetryLayer,
};
pub use service::{EffectorService, ServiceEffector};
pub use stack::Pipeline;
pub use timeout::{Timeout, TimeoutLayer};
