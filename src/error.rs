//! Error types for effectors
//!
//! Every effector returns [`EffectorError`]. Policy-caused failures get their own variants so
//! callers can tell "the policy gave up" apart from "my action failed":
//!
//! - [`EffectorError::Canceled`] / [`EffectorError::DeadlineExceeded`]: the execution context
//!   fired while a policy was waiting.
//! - [`EffectorError::CircuitOpen`]: the breaker short-circuited the call.
//! - [`EffectorError::InvalidRate`]: the rate limiter was built with a non-positive rate.
//! - [`EffectorError::Panicked`]: a protector recovered a panic.
//! - [`EffectorError::Joined`]: several failures collected by a join-all strategy.
//! - [`EffectorError::Inner`]: the action's own failure.
use std::time::Duration;

/// Boxed error returned by user actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for all effectors.
#[derive(Debug, thiserror::Error)]
pub enum EffectorError {
    /// The execution context was cancelled.
    #[error("context canceled")]
    Canceled,
    /// The execution context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// The circuit breaker rejected the call, or the failure that tripped it was masked.
    #[error("circuit breaker open ({failures} consecutive failures, retry in {retry_in:?})")]
    CircuitOpen {
        /// Consecutive failures recorded by the breaker.
        failures: usize,
        /// Time left until the breaker lets a probe through.
        retry_in: Duration,
        /// The action failure that tripped the breaker, when this call made it.
        #[source]
        source: Option<Box<EffectorError>>,
    },
    /// The rate limiter was configured with a rate that is not positive and finite.
    #[error("rate limiter misconfigured: rate must be positive and finite (got {rate})")]
    InvalidRate {
        /// The rejected rate, in permits per second.
        rate: f64,
    },
    /// A panic was caught and converted into an error.
    #[error("recovered from panic: {message}")]
    Panicked {
        /// Rendered panic payload.
        message: String,
        /// The payload itself when it already was an error.
        #[source]
        source: Option<BoxError>,
    },
    /// Several failures joined together.
    #[error("{}", join_messages(.0))]
    Joined(Vec<EffectorError>),
    /// The wrapped action failed.
    #[error(transparent)]
    Inner(BoxError),
}

fn join_messages(errors: &[EffectorError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

impl EffectorError {
    /// Wrap an action failure.
    ///
    /// Strings and any `std::error::Error` are accepted. An `EffectorError` that went through a
    /// `BoxError` is unwrapped again instead of being nested inside `Inner`.
    pub fn inner(err: impl Into<BoxError>) -> Self {
        Self::from_boxed(err.into())
    }

    pub(crate) fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<EffectorError>() {
            Ok(err) => *err,
            Err(other) => Self::Inner(other),
        }
    }

    /// Join errors into one. Returns `None` when there is nothing to join.
    pub fn join(errors: Vec<EffectorError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self::Joined(errors))
        }
    }

    /// Check if this error is a context cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Check if this error is a context deadline.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }

    /// Check if this error came from the execution context rather than an action.
    pub fn is_context(&self) -> bool {
        self.is_canceled() || self.is_deadline_exceeded()
    }

    /// Check if this error is due to circuit breaker
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Check if this error is a rate limiter misconfiguration.
    pub fn is_invalid_rate(&self) -> bool {
        matches!(self, Self::InvalidRate { .. })
    }

    /// Check if this error is a recovered panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }

    /// Check if this error wraps an action failure.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Borrow the inner action error as a concrete type.
    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        match self {
            Self::Inner(e) => e.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Iterate over this error and, for `Joined`, every constituent (depth first).
    pub fn iter(&self) -> impl Iterator<Item = &EffectorError> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            if let Self::Joined(errors) = next {
                stack.extend(errors.iter().rev());
            }
            Some(next)
        })
    }

    /// True if this error or any joined constituent matches `predicate`.
    pub fn contains<F>(&self, predicate: F) -> bool
    where
        F: Fn(&EffectorError) -> bool,
    {
        self.iter().any(predicate)
    }
}
