//! Backoff schedules for the retrier.
//!
//! A backoff maps a zero-based retry index to a wait: `delay(0)` is the wait after the first
//! failed attempt, `delay(1)` after the second, and so on. Delays saturate at [`MAX_BACKOFF`].
//!
//! ```rust
//! use std::time::Duration;
//! use effectors::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(100))
//!     .with_max(Duration::from_millis(350))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::from_millis(100));
//! assert_eq!(backoff.delay(1), Duration::from_millis(200));
//! assert_eq!(backoff.delay(2), Duration::from_millis(350)); // capped
//!
//! // The default schedule: 2^attempt seconds.
//! assert_eq!(Backoff::default().delay(3), Duration::from_secs(8));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maximum delay used when calculations overflow (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffError {
    UnsupportedMax,
    MaxMustBePositive,
    MaxLessThanBase { base: Duration, max: Duration },
}

impl fmt::Display for BackoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffError::UnsupportedMax => {
                write!(f, "with_max is only valid for linear or exponential backoff")
            }
            BackoffError::MaxMustBePositive => write!(f, "max must be greater than zero"),
            BackoffError::MaxLessThanBase { base, max } => {
                write!(f, "max ({:?}) must be >= base ({:?})", max, base)
            }
        }
    }
}

impl std::error::Error for BackoffError {}

type DelayFn = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

#[derive(Clone)]
enum BackoffKind {
    Constant(Duration),
    Linear { base: Duration, max: Option<Duration> },
    Exponential { base: Duration, max: Option<Duration> },
    Custom(DelayFn),
}

/// Pure function from retry index to wait duration.
#[derive(Clone)]
pub struct Backoff {
    kind: BackoffKind,
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BackoffKind::Constant(delay) => f.debug_tuple("Constant").field(delay).finish(),
            BackoffKind::Linear { base, max } => {
                f.debug_struct("Linear").field("base", base).field("max", max).finish()
            }
            BackoffKind::Exponential { base, max } => {
                f.debug_struct("Exponential").field("base", base).field("max", max).finish()
            }
            BackoffKind::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl Default for Backoff {
    /// `2^attempt` seconds: 1s, 2s, 4s, …
    fn default() -> Self {
        Self::exponential(Duration::from_secs(1))
    }
}

impl Backoff {
    /// Same delay before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self { kind: BackoffKind::Constant(delay) }
    }

    /// `base * (attempt + 1)`.
    pub fn linear(base: Duration) -> Self {
        Self { kind: BackoffKind::Linear { base, max: None } }
    }

    /// `base * 2^attempt`.
    pub fn exponential(base: Duration) -> Self {
        Self { kind: BackoffKind::Exponential { base, max: None } }
    }

    /// Arbitrary schedule. The function should be pure; its result is still capped at
    /// [`MAX_BACKOFF`].
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        Self { kind: BackoffKind::Custom(Arc::new(f)) }
    }

    /// Cap a linear or exponential schedule.
    /// Returns an error for other kinds, if `max` is zero, or if `max < base`.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        match &mut self.kind {
            BackoffKind::Linear { base, max: existing }
            | BackoffKind::Exponential { base, max: existing } => {
                if max < *base {
                    return Err(BackoffError::MaxLessThanBase { base: *base, max });
                }
                *existing = Some(max);
                Ok(self)
            }
            BackoffKind::Constant(_) | BackoffKind::Custom(_) => Err(BackoffError::UnsupportedMax),
        }
    }

    /// Wait before retry number `attempt + 1`.
    pub fn delay(&self, attempt: usize) -> Duration {
        let raw = match &self.kind {
            BackoffKind::Constant(delay) => *delay,
            BackoffKind::Linear { base, max } => {
                let factor = attempt.saturating_add(1).min(u32::MAX as usize) as u32;
                let linear = base.checked_mul(factor).unwrap_or(MAX_BACKOFF);
                max.map_or(linear, |m| linear.min(m))
            }
            BackoffKind::Exponential { base, max } => {
                let exponent = attempt.min(u32::MAX as usize) as u32;
                let multiplier = 2u128.saturating_pow(exponent);
                let nanos = base.as_nanos().saturating_mul(multiplier).min(MAX_BACKOFF.as_nanos());
                let exp = Duration::from_nanos(nanos as u64);
                max.map_or(exp, |m| exp.min(m))
            }
            BackoffKind::Custom(f) => f(attempt),
        };
        raw.min(MAX_BACKOFF)
    }
}
