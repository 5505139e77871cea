//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup via [`matchit`]. Every
//! route resolves to exactly one handler with its middleware chain already
//! folded in; router-wide layers run around it at dispatch time.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::api_error::ApiError;
use crate::handler::{BoxedHandler, ErasedHandler, Handler};
use crate::middleware::{self, BoxedMiddleware, Next};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::routes::Route;

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
/// Registration methods return `self` so they chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    table: Vec<(Method, String, BoxedHandler)>,
    layers: Vec<BoxedMiddleware>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), table: Vec::new(), layers: Vec::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax, `req.param("name")` retrieves them:
    ///
    /// ```rust
    /// # use gantry::{Request, Response, Router};
    /// # use http::Method;
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics when `path` is malformed or conflicts with a registered route.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.insert(method, path, handler.into_boxed_handler());
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self { self.on(Method::GET, path, handler) }
    pub fn post(self, path: &str, handler: impl Handler) -> Self { self.on(Method::POST, path, handler) }
    pub fn put(self, path: &str, handler: impl Handler) -> Self { self.on(Method::PUT, path, handler) }
    pub fn patch(self, path: &str, handler: impl Handler) -> Self { self.on(Method::PATCH, path, handler) }
    pub fn delete(self, path: &str, handler: impl Handler) -> Self { self.on(Method::DELETE, path, handler) }

    /// Registers `handler` behind `middlewares` (run first to last).
    ///
    /// # Panics
    ///
    /// Same as [`Router::on`].
    pub fn route(&mut self, method: Method, path: &str, handler: BoxedHandler, middlewares: &[BoxedMiddleware]) {
        self.insert(method, path, middleware::wrap(handler, middlewares));
    }

    /// Adds a middleware that runs around every request, matched or not.
    pub fn layer(mut self, middleware: BoxedMiddleware) -> Self {
        self.layers.push(middleware);
        self
    }

    /// Mounts every route of `router` under `prefix`. The nested router's
    /// layers stay attached to its own routes.
    pub fn nest(mut self, prefix: &str, router: Router) -> Self {
        let prefix = prefix.trim_end_matches('/');
        for (method, path, handler) in router.table {
            let full = if path == "/" { prefix.to_owned() } else { format!("{prefix}{path}") };
            let handler = middleware::wrap(handler, &router.layers);
            self.insert(method, &full, handler);
        }
        self
    }

    /// Registers `routes`, each behind `middlewares`. See [`routes::group`](crate::routes::group).
    pub fn group(mut self, middlewares: Vec<BoxedMiddleware>, routes: Vec<Route>) -> Self {
        crate::routes::group(&mut self, middlewares, routes);
        self
    }

    fn insert(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        let path = if path.is_empty() { "/" } else { path };
        self.routes
            .entry(method.clone())
            .or_default()
            .insert(path, Arc::clone(&handler))
            .unwrap_or_else(|e| panic!("invalid route `{method} {path}`: {e}"));
        debug!(%method, path, "route registered");
        self.table.push((method, path.to_owned(), handler));
    }

    /// Routes one request and produces one response.
    ///
    /// Unknown paths answer with a JSONAPI `404 routeNotFound`; a path known
    /// only under other methods answers `405 methodNotAllowed`.
    pub async fn call(&self, mut req: Request) -> Response {
        let endpoint = match self.lookup(req.method(), req.path()) {
            Some((handler, params)) => {
                req.params = params;
                handler
            }
            None => {
                let error = if self.path_exists(req.path()) {
                    ApiError::method_not_allowed(req.method(), req.original_url())
                } else {
                    ApiError::route_not_found(req.method(), req.original_url())
                };
                fallback(error)
            }
        };

        if self.layers.is_empty() {
            return endpoint.call(req).await;
        }
        Next::new(endpoint, self.layers.as_slice().into()).run(req).await
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    fn path_exists(&self, path: &str) -> bool {
        self.routes.values().any(|tree| tree.at(path).is_ok())
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

fn fallback(error: ApiError) -> BoxedHandler {
    (move |_req: Request| {
        let error = error.clone();
        async move { error.into_response() }
    })
    .into_boxed_handler()
}
