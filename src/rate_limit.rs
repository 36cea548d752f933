//! Token-bucket admission control.
//!
//! [`RateLimiter`] waits for a permit from a [`TokenBucket`] before every invocation of its
//! inner effector. The bucket refills at `rate` permits per second with a burst capacity of
//! exactly one.
//!
//! Waiting works by reservation: a caller takes the next permit immediately (the token count
//! may go negative) and sleeps until it matures. If the context is cancelled, its deadline
//! passes, or the waiting future is dropped, the inner effector is never invoked and the
//! permit is handed back, unless later callers already queued behind it; then the slot is
//! forfeited so no two admissions land closer than one permit interval. A context whose deadline falls before the permit matures fails at once
//! with [`EffectorError::DeadlineExceeded`] instead of sleeping.
//!
//! A rate that is not positive and finite is a configuration error: every invocation fails
//! with [`EffectorError::InvalidRate`], immediately.
//!
//! The bucket is the one piece of state in this crate built for concurrent mutation; share it
//! across limiters with [`RateLimiter::with_bucket`] or [`RateLimitLayer`].

use crate::{Context, Effector, EffectorError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tower_layer::Layer;

const CAPACITY: f64 = 1.0;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    updated: Instant,
    /// Number of reservations taken so far.
    reserved: u64,
}

/// Permits-per-second bucket with a burst of one.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket. Fails with [`EffectorError::InvalidRate`] unless `rate` is positive,
    /// finite, and slow enough that one permit interval is representable.
    pub fn new(rate: f64) -> Result<Self, EffectorError> {
        let valid = rate.is_finite()
            && rate > 0.0
            && Duration::try_from_secs_f64(rate.recip()).is_ok();
        if !valid {
            return Err(EffectorError::InvalidRate { rate });
        }
        Ok(Self {
            rate,
            state: Mutex::new(BucketState { tokens: CAPACITY, updated: Instant::now(), reserved: 0 }),
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.updated).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(CAPACITY);
        state.updated = now;
    }

    /// Take the next permit and return how long until it may be used.
    fn reserve(&self) -> Reservation<'_> {
        let now = Instant::now();
        let mut state = self.lock();
        self.refill(&mut state, now);
        state.tokens -= 1.0;
        state.reserved += 1;
        let wait = if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(-state.tokens / self.rate).unwrap_or(Duration::MAX)
        };
        Reservation { bucket: self, seq: state.reserved, wait, armed: true }
    }

    /// Undo reservation `seq`.
    ///
    /// Only the most recent reservation can be undone. Once later callers have queued behind
    /// it, their wait times already account for this permit, so handing it back would let a
    /// new caller in alongside one of them. The slot is forfeited instead.
    fn give_back(&self, seq: u64) {
        let now = Instant::now();
        let mut state = self.lock();
        self.refill(&mut state, now);
        if state.reserved != seq {
            return;
        }
        state.tokens = (state.tokens + 1.0).min(CAPACITY);
    }

    /// Wait for a permit, racing `ctx`.
    pub async fn acquire(&self, ctx: &Context) -> Result<(), EffectorError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let mut reservation = self.reserve();
        if reservation.wait.is_zero() {
            reservation.commit();
            return Ok(());
        }
        if let Some(deadline) = ctx.deadline() {
            if deadline.saturating_duration_since(Instant::now()) < reservation.wait {
                return Err(EffectorError::DeadlineExceeded);
            }
        }
        ctx.sleep(reservation.wait).await?;
        reservation.commit();
        Ok(())
    }
}

/// A permit taken from the bucket. Returned on drop unless committed.
struct Reservation<'a> {
    bucket: &'a TokenBucket,
    seq: u64,
    wait: Duration,
    armed: bool,
}

impl Reservation<'_> {
    fn commit(&mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.bucket.give_back(self.seq);
        }
    }
}

/// Effector admitting at most `rate` invocations per second of its inner effector.
#[derive(Debug, Clone)]
pub struct RateLimiter<E> {
    bucket: Option<Arc<TokenBucket>>,
    rate: f64,
    inner: E,
}

impl<E> RateLimiter<E> {
    /// Limit `inner` with a bucket of its own.
    ///
    /// An invalid rate does not panic here; it is logged and reported by every invocation.
    pub fn new(rate: f64, inner: E) -> Self {
        let bucket = match TokenBucket::new(rate) {
            Ok(bucket) => Some(Arc::new(bucket)),
            Err(err) => {
                tracing::warn!(rate, error = %err, "rate limiter misconfigured");
                None
            }
        };
        Self { bucket, rate, inner }
    }

    /// Limit `inner` with a bucket shared with other limiters.
    pub fn with_bucket(bucket: Arc<TokenBucket>, inner: E) -> Self {
        Self { rate: bucket.rate(), bucket: Some(bucket), inner }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

#[async_trait]
impl<E> Effector for RateLimiter<E>
where
    E: Effector,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        let bucket = match &self.bucket {
            Some(bucket) => bucket,
            None => return Err(EffectorError::InvalidRate { rate: self.rate }),
        };
        bucket.acquire(ctx).await?;
        self.inner.invoke(ctx).await
    }
}

/// Layer producing [`RateLimiter`]s that all draw from one bucket.
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    bucket: Option<Arc<TokenBucket>>,
    rate: f64,
}

impl RateLimitLayer {
    pub fn new(rate: f64) -> Self {
        let bucket = match TokenBucket::new(rate) {
            Ok(bucket) => Some(Arc::new(bucket)),
            Err(err) => {
                tracing::warn!(rate, error = %err, "rate limit layer misconfigured");
                None
            }
        };
        Self { bucket, rate }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimiter<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiter { bucket: self.bucket.clone(), rate: self.rate, inner }
    }
}
