//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: tracing, authentication-header inspection,
//! request-id injection. A middleware receives the request and a [`Next`]
//! handle; calling [`Next::run`] continues down the chain and eventually
//! reaches the route handler.
//!
//! ```rust
//! use gantry::middleware::{self, Next};
//! use gantry::{ApiError, IntoResponse, Request};
//! use http::StatusCode;
//!
//! let auth = middleware::from_fn(|req: Request, next: Next| async move {
//!     if req.header("authorization").is_none() {
//!         return ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized").into_response();
//!     }
//!     next.run(req).await
//! });
//! ```
//!
//! Middlewares are attached per route (see [`routes`](crate::routes)) or to
//! the whole router with [`Router::layer`](crate::Router::layer).

mod trace;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, erase};
use crate::request::Request;
use crate::response::Response;

pub use trace::Trace;

/// A request interceptor.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, req: Request, next: Next) -> Response;
}

/// A shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The rest of the chain after the current middleware.
pub struct Next {
    endpoint: BoxedHandler,
    chain: Arc<[BoxedMiddleware]>,
    index: usize,
}

impl Next {
    pub(crate) fn new(endpoint: BoxedHandler, chain: Arc<[BoxedMiddleware]>) -> Self {
        Self { endpoint, chain, index: 0 }
    }

    /// Runs the remaining middlewares and then the route handler.
    pub async fn run(self, req: Request) -> Response {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                let next = Self { index: self.index + 1, ..self };
                middleware.handle(req, next).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

/// Wraps `endpoint` so that `middlewares` run before it, first to last.
pub(crate) fn wrap(endpoint: BoxedHandler, middlewares: &[BoxedMiddleware]) -> BoxedHandler {
    if middlewares.is_empty() {
        return endpoint;
    }
    erase(Chain { endpoint, chain: middlewares.into() })
}

struct Chain {
    endpoint: BoxedHandler,
    chain: Arc<[BoxedMiddleware]>,
}

impl ErasedHandler for Chain {
    fn call(&self, req: Request) -> BoxFuture {
        let next = Next::new(Arc::clone(&self.endpoint), Arc::clone(&self.chain));
        Box::pin(next.run(req))
    }
}

/// Builds a middleware from an async closure.
pub fn from_fn<F, Fut>(f: F) -> BoxedMiddleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(FromFn(f))
}

struct FromFn<F>(F);

#[async_trait]
impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn handle(&self, req: Request, next: Next) -> Response {
        (self.0)(req, next).await
    }
}
