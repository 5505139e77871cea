//! Route registration sugar on top of [`Router`].
//!
//! Routes are deferred: a [`Route`] is built first and registered later,
//! once the middlewares it runs behind are known. That lets the same route
//! definitions be grouped with different middleware stacks:
//!
//! ```rust
//! use std::sync::Arc;
//! use gantry::controller::{Controller, HandlerResult, RestController};
//! use gantry::middleware::Trace;
//! use gantry::routes::{RestAction, RestValidators, Routes, subgroup};
//! use gantry::validator::BaseValidator;
//! use gantry::{Request, Router};
//! use http::StatusCode;
//! use serde_json::{Value, json};
//!
//! struct Users;
//! impl Controller for Users {}
//! impl RestController for Users {}
//!
//! impl Users {
//!     async fn me(self: Arc<Self>, _req: Request, _validated: Value) -> HandlerResult {
//!         self.response(StatusCode::OK).data(&json!({ "id": 1 }))
//!     }
//! }
//!
//! let users = Routes::new(Users);
//! let router = Router::new().group(vec![Arc::new(Trace)], vec![
//!     users.get("/me", Users::me, BaseValidator),
//!     subgroup(vec![], vec![
//!         users.rest(RestValidators::default(), &RestAction::ALL),
//!     ]),
//! ]);
//! ```

mod gateway;
mod rest;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use http::Method;
use serde_json::Value;
use tracing::{error, info};

use crate::api_error::ApiError;
use crate::controller::{Controller, HandlerResult};
use crate::handler::{BoxFuture, ErasedHandler, erase};
use crate::middleware::BoxedMiddleware;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Router;
use crate::validator::Validator;

pub use gateway::Gateway;
pub use rest::{RestAction, RestValidators};

type Register = Box<dyn FnOnce(&mut Router, &[BoxedMiddleware]) + Send>;

/// A route waiting to be registered behind a middleware stack.
pub struct Route(Register);

impl Route {
    /// A route from a registration function. The function receives the
    /// router and the middlewares the route must run behind.
    pub fn new(register: impl FnOnce(&mut Router, &[BoxedMiddleware]) + Send + 'static) -> Self {
        Self(Box::new(register))
    }

    pub fn register(self, router: &mut Router, middlewares: &[BoxedMiddleware]) {
        (self.0)(router, middlewares);
    }
}

/// Registers every route of `routes` behind `middlewares`.
pub fn group(router: &mut Router, middlewares: Vec<BoxedMiddleware>, routes: Vec<Route>) {
    for route in routes {
        route.register(router, &middlewares);
    }
}

/// A group that behaves as a single route, so it can be nested inside
/// another group. Its own middlewares run after the enclosing ones.
pub fn subgroup(middlewares: Vec<BoxedMiddleware>, routes: Vec<Route>) -> Route {
    Route::new(move |router, enclosing| {
        let chain = enclosing.iter().cloned().chain(middlewares).collect();
        group(router, chain, routes);
    })
}

/// A controller action: an async function of the controller, the request
/// and the validated object.
pub trait Action<C>: Send + Sync + 'static {
    fn call(&self, controller: Arc<C>, req: Request, validated: Value)
        -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
}

impl<C, F, Fut> Action<C> for F
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Request, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, controller: Arc<C>, req: Request, validated: Value)
        -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>
    {
        Box::pin(self(controller, req, validated))
    }
}

/// Builds routes whose actions live on one controller.
pub struct Routes<C> {
    controller: Arc<C>,
}

impl<C> Clone for Routes<C> {
    fn clone(&self) -> Self {
        Self { controller: Arc::clone(&self.controller) }
    }
}

impl<C: Controller> Routes<C> {
    pub fn new(controller: C) -> Self {
        Self::shared(Arc::new(controller))
    }

    pub fn shared(controller: Arc<C>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<C> {
        &self.controller
    }

    /// A `method path` route: validate with `validator`, then run `action`.
    pub fn method(&self, method: Method, path: &str, action: impl Action<C>, validator: impl Validator) -> Route {
        self.endpoint_route(method, path, Arc::new(action), Arc::new(validator))
    }

    pub fn get(&self, path: &str, action: impl Action<C>, validator: impl Validator) -> Route {
        self.method(Method::GET, path, action, validator)
    }

    pub fn post(&self, path: &str, action: impl Action<C>, validator: impl Validator) -> Route {
        self.method(Method::POST, path, action, validator)
    }

    pub fn put(&self, path: &str, action: impl Action<C>, validator: impl Validator) -> Route {
        self.method(Method::PUT, path, action, validator)
    }

    pub fn patch(&self, path: &str, action: impl Action<C>, validator: impl Validator) -> Route {
        self.method(Method::PATCH, path, action, validator)
    }

    pub fn delete(&self, path: &str, action: impl Action<C>, validator: impl Validator) -> Route {
        self.method(Method::DELETE, path, action, validator)
    }

    fn endpoint_route(
        &self,
        method: Method,
        path: &str,
        action: Arc<dyn Action<C>>,
        validator: Arc<dyn Validator>,
    ) -> Route {
        let endpoint = erase(Endpoint {
            controller: Arc::clone(&self.controller),
            action,
            validator,
        });
        let path = path.to_owned();
        Route::new(move |router, middlewares| router.route(method, &path, endpoint, middlewares))
    }
}

/// The method pipeline: validate, run the action, report.
struct Endpoint<C> {
    controller: Arc<C>,
    action: Arc<dyn Action<C>>,
    validator: Arc<dyn Validator>,
}

impl<C: Controller> ErasedHandler for Endpoint<C> {
    fn call(&self, req: Request) -> BoxFuture {
        let controller = Arc::clone(&self.controller);
        let action = Arc::clone(&self.action);
        let validator = Arc::clone(&self.validator);
        let route = req.original_url().to_owned();

        Box::pin(async move {
            let outcome = AssertUnwindSafe(run(controller, action, validator, req))
                .catch_unwind()
                .await;

            let response = match outcome {
                Ok(Ok(response)) => response,
                Ok(Err(error)) => error.into_response(),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(route = %route, "handler panicked: {message}");
                    ApiError::internal_for_route(&route)
                        .meta("internalError", message)
                        .into_response()
                }
            };
            info!(route = %route, status = response.status_code().as_u16(), "response sent");
            response
        })
    }
}

async fn run<C: 'static>(
    controller: Arc<C>,
    action: Arc<dyn Action<C>>,
    validator: Arc<dyn Validator>,
    req: Request,
) -> HandlerResult {
    info!(validator = validator.name(), "validation running");
    let validated = validator.validate(&req).await?;
    info!(validator = validator.name(), "request is valid");

    action.call(controller, req, validated).await
}

/// The message of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::middleware::{Next, from_fn};
    use crate::validator::{BaseValidator, JsonBody};

    struct Users;
    impl Controller for Users {}

    impl Users {
        async fn echo(self: Arc<Self>, _req: Request, validated: Value) -> HandlerResult {
            self.response(StatusCode::CREATED).data(&validated)
        }

        async fn fail(self: Arc<Self>, req: Request, _validated: Value) -> HandlerResult {
            self.throw(&req, Some(ApiError::new(StatusCode::CONFLICT, "duplicateUser")))
        }

        async fn explode(self: Arc<Self>, _req: Request, _validated: Value) -> HandlerResult {
            panic!("database on fire");
        }
    }

    struct Reject;

    #[async_trait]
    impl Validator for Reject {
        async fn validate(&self, req: &Request) -> Result<Value, ApiError> {
            self.throw(req, Some(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "invalidUser")))
        }
    }

    #[derive(serde::Deserialize, serde::Serialize)]
    struct NewUser {
        name: String,
    }

    async fn body_of(response: Response) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> BoxedMiddleware {
        let log = Arc::clone(log);
        from_fn(move |req, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(name);
                next.run(req).await
            }
        })
    }

    #[tokio::test]
    async fn validated_object_reaches_the_action() {
        let users = Routes::new(Users);
        let router = Router::new().group(vec![], vec![
            users.post("/users", Users::echo, JsonBody::<NewUser>::new("new user")),
        ]);

        let req = Request::builder().method(Method::POST).uri("/users").json(&json!({ "name": "ada" })).build();
        let response = router.call(req).await;

        assert_eq!(response.status_code(), StatusCode::CREATED);
        assert_eq!(body_of(response).await, json!({ "data": { "name": "ada" } }));
    }

    #[tokio::test]
    async fn validation_errors_short_circuit() {
        let users = Routes::new(Users);
        let router = Router::new().group(vec![], vec![users.post("/users", Users::echo, Reject)]);

        let response = router.call(Request::builder().method(Method::POST).uri("/users").build()).await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_of(response).await["errors"][0]["title"], "invalidUser");
    }

    #[tokio::test]
    async fn action_errors_become_error_documents() {
        let users = Routes::new(Users);
        let router = Router::new().group(vec![], vec![users.get("/users", Users::fail, BaseValidator)]);

        let response = router.call(Request::builder().uri("/users").build()).await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn panics_become_generic_internal_errors() {
        let users = Routes::new(Users);
        let router = Router::new().group(vec![], vec![users.get("/boom", Users::explode, BaseValidator)]);

        let response = router.call(Request::builder().uri("/boom?x=1").build()).await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let error = &body_of(response).await["errors"][0];
        assert_eq!(error["title"], "genericInternalServerError");
        assert_eq!(error["meta"]["route"], "/boom?x=1");
        assert_eq!(error["meta"]["internalError"], "database on fire");
    }

    #[tokio::test]
    async fn subgroup_middlewares_run_after_enclosing_ones() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let users = Routes::new(Users);
        let router = Router::new().group(vec![recorder(&log, "outer")], vec![
            subgroup(vec![recorder(&log, "inner")], vec![
                users.post("/users", Users::echo, BaseValidator),
            ]),
        ]);

        let response = router.call(Request::builder().method(Method::POST).uri("/users").build()).await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[test]
    fn panic_messages_are_extracted() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "handler panicked");
    }
}
