//! Panic containment.
//!
//! [`Protector`] polls the wrapped effector inside `catch_unwind` and turns a panic into
//! [`EffectorError::Panicked`]. Payloads that already are errors (`EffectorError` or a boxed
//! `std::error::Error`) are kept as the error source; `&str`/`String` payloads become the
//! message. Any other payload, including a concrete error type passed to `panic_any` without
//! boxing it first, cannot be recognised and is reported as "non-string panic payload".
//!
//! The process panic hook still runs, so the panic is printed as usual.

use crate::{BoxError, Context, Effector, EffectorError};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tower_layer::Layer;

/// Converts panics raised by the inner effector into errors.
#[derive(Debug, Clone, Default)]
pub struct Protector<E> {
    inner: E,
}

impl<E> Protector<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

#[async_trait]
impl<E> Effector for Protector<E>
where
    E: Effector,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        match AssertUnwindSafe(self.inner.invoke(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let err = panic_to_error(payload);
                tracing::error!(error = %err, "effector panicked");
                Err(err)
            }
        }
    }
}

/// Render a panic payload as an [`EffectorError::Panicked`].
pub(crate) fn panic_to_error(payload: Box<dyn Any + Send>) -> EffectorError {
    let payload = match payload.downcast::<EffectorError>() {
        Ok(err) => {
            return EffectorError::Panicked {
                message: err.to_string(),
                source: Some(err as BoxError),
            };
        }
        Err(other) => other,
    };
    let payload = match payload.downcast::<BoxError>() {
        Ok(err) => {
            return EffectorError::Panicked { message: err.to_string(), source: Some(*err) };
        }
        Err(other) => other,
    };
    let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    EffectorError::Panicked { message, source: None }
}

/// Layer producing [`Protector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectLayer;

impl<S> Layer<S> for ProtectLayer {
    type Service = Protector<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Protector::new(inner)
    }
}
