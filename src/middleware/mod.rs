//! Middleware pipeline — the handler chain the burst cache sits in front of.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware, including
//!   [`BurstCache`](crate::cache::BurstCache).
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer. For the cache, everything behind `Next` is the
//!   downstream handler whose output gets recorded.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] — converts a [`Middleware`] into a [`MiddlewareHandler`].
//! - [`endpoint`] — converts an async handler function into the terminal
//!   [`MiddlewareHandler`] of a chain.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{Response, context::Context};

/// Boxed future returned by every layer of the pipeline.
pub type BoxResponse = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A cursor into the remaining middleware chain for a single request.
///
/// Calling [`Next::run`] advances the cursor by one position and invokes the next
/// middleware (or returns a fallback `500` response when the chain is exhausted
/// without any layer generating a response).
///
/// `Next` is consumed on each call to [`run`](Self::run), so the chain runs at
/// most once per middleware invocation. It is `Send + 'static`, which lets a
/// layer hand the rest of the chain to a spawned task.
///
/// # Examples
///
/// ```rust,no_run
/// use burstcache::{Response, context::Context, middleware::{BoxResponse, Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
///
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> BoxResponse + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use burstcache::{BurstCache, BurstConfig, middleware::from_middleware};
///
/// let handler = from_middleware(Arc::new(BurstCache::new(BurstConfig::default())));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// Wraps an async function as the last layer of a chain.
///
/// The returned handler never calls `next`; whatever the function returns is
/// the response of the chain.
///
/// # Examples
///
/// ```rust,no_run
/// use burstcache::{Response, StatusCode, middleware::endpoint};
///
/// let handler = endpoint(|_ctx| async { Response::new(StatusCode::Ok).body("hello") });
/// ```
pub fn endpoint<F, Fut>(handler: F) -> MiddlewareHandler
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |ctx: Context, _next: Next| -> BoxResponse { Box::pin(handler(ctx)) })
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack.
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// If no handler remains a `500 Internal Server Error` response is returned.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            Response::new(crate::StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline")
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may pass the
/// request through, short-circuit with their own [`Response`], or decorate the
/// downstream response.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared across
///   Tokio tasks.
/// - `handle` returns a `'static` future, so state needed inside it must be
///   cloned or reference-counted out of `&self`.
/// - Implementations **should not** hold lock guards across an `.await` point.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse;
}
