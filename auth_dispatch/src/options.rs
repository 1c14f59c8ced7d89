//! Per-route options that are either fixed up front or derived from each request

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::HandlerError;
use crate::request::AuthRequest;

/// Boxed, sendable future used by hooks and dynamic options
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type OptionsFn<T> = dyn Fn(&AuthRequest) -> BoxFuture<'static, Result<T, HandlerError>> + Send + Sync;

/// Options for a route: a static value, or a function of the incoming request
///
/// Resolution has no side effects beyond what the supplied function does. Validating the
/// produced fields is left to the route that consumes them.
pub enum HandlerOptions<T> {
    Static(T),
    Dynamic(Arc<OptionsFn<T>>),
}

impl<T> HandlerOptions<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Derive options synchronously from the request.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&AuthRequest) -> Result<T, HandlerError> + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(
            move |req: &AuthRequest| -> BoxFuture<'static, Result<T, HandlerError>> {
                let result = f(req);
                Box::pin(async move { result })
            },
        ))
    }

    /// Derive options with an async function of the request.
    ///
    /// The function receives its own copy of the request so the future can outlive the call.
    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(AuthRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HandlerError>> + Send + 'static,
    {
        Self::Dynamic(Arc::new(
            move |req: &AuthRequest| -> BoxFuture<'static, Result<T, HandlerError>> {
                Box::pin(f(req.clone()))
            },
        ))
    }

    pub async fn resolve(&self, req: &AuthRequest) -> Result<T, HandlerError> {
        match self {
            Self::Static(options) => Ok(options.clone()),
            Self::Dynamic(f) => f(req).await,
        }
    }
}

impl<T: Default> Default for HandlerOptions<T> {
    fn default() -> Self {
        Self::Static(T::default())
    }
}

impl<T> From<T> for HandlerOptions<T> {
    fn from(options: T) -> Self {
        Self::Static(options)
    }
}

impl<T> Clone for HandlerOptions<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Static(options) => Self::Static(options.clone()),
            Self::Dynamic(f) => Self::Dynamic(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for HandlerOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(options) => f.debug_tuple("Static").field(options).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}
