//! Adapters between effectors and `tower` services.
//!
//! - [`EffectorService`] exposes an effector as a `Service<Context>`, so tower middleware can be
//!   stacked on top of it.
//! - [`ServiceEffector`] goes the other way: any `Service<Context>` (its response is discarded)
//!   becomes an effector and can be wrapped by this crate's policies. Service errors are boxed;
//!   an [`EffectorError`] that travelled through the service stack comes back out unchanged.

use crate::{BoxError, Context, Effector, EffectorError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::Poll;
use tower::ServiceExt;
use tower_service::Service;

/// An effector seen as a `tower_service::Service<Context>`.
pub struct EffectorService<E: ?Sized> {
    inner: Arc<E>,
}

impl<E> EffectorService<E> {
    pub fn new(effector: E) -> Self {
        Self { inner: Arc::new(effector) }
    }
}

impl<E: ?Sized> EffectorService<E> {
    pub fn from_arc(effector: Arc<E>) -> Self {
        Self { inner: effector }
    }
}

impl<E: ?Sized> Clone for EffectorService<E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<E: ?Sized> std::fmt::Debug for EffectorService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectorService").finish_non_exhaustive()
    }
}

impl<E> Service<Context> for EffectorService<E>
where
    E: Effector + ?Sized + 'static,
{
    type Response = ();
    type Error = EffectorError;
    type Future = BoxFuture<'static, Result<(), EffectorError>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Context) -> Self::Future {
        let inner = self.inner.clone();
        Box::pin(async move { inner.invoke(&ctx).await })
    }
}

/// A `tower_service::Service<Context>` seen as an effector.
#[derive(Debug, Clone)]
pub struct ServiceEffector<S> {
    inner: S,
}

impl<S> ServiceEffector<S> {
    pub fn new(service: S) -> Self {
        Self { inner: service }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S> Effector for ServiceEffector<S>
where
    S: Service<Context> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    async fn invoke(&self, ctx: &Context) -> Result<(), EffectorError> {
        let service = self.inner.clone();
        service
            .oneshot(ctx.clone())
            .await
            .map(|_| ())
            .map_err(|err| EffectorError::from_boxed(err.into()))
    }
}
