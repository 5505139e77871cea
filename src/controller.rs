//! Controllers own the actions that routes dispatch to.

use std::fmt;

use async_trait::async_trait;
use http::StatusCode;
use serde_json::Value;

use crate::api_error::{self, ApiError};
use crate::jsonapi::JsonApi;
use crate::request::Request;
use crate::response::Response;

/// What every controller action returns. `Err` is rendered as a JSONAPI
/// error document.
pub type HandlerResult = Result<Response, ApiError>;

/// A resource controller.
///
/// ```rust
/// use std::sync::Arc;
/// use gantry::controller::{Controller, HandlerResult};
/// use gantry::Request;
/// use http::StatusCode;
/// use serde_json::{Value, json};
///
/// struct Users;
/// impl Controller for Users {}
///
/// impl Users {
///     async fn ping(self: Arc<Self>, _req: Request, _validated: Value) -> HandlerResult {
///         self.response(StatusCode::OK).meta(json!({ "pong": true }))
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// Used in error metadata; defaults to the type name.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// A JSONAPI responder bound to `status`.
    fn response(&self, status: StatusCode) -> JsonApi {
        JsonApi::new(status)
    }

    /// See [`api_error::throw`].
    fn throw<T>(&self, req: &Request, error: Option<ApiError>) -> Result<T, ApiError>
    where
        Self: Sized,
    {
        api_error::throw(req, error)
    }

    /// See [`api_error::catcher`].
    fn catcher<E: fmt::Display>(&self, req: &Request, error: Option<ApiError>) -> impl FnOnce(E) -> ApiError
    where
        Self: Sized,
    {
        api_error::catcher(req, error)
    }
}

/// A controller serving the five REST actions registered by
/// [`Routes::rest`](crate::routes::Routes::rest).
///
/// Every action defaults to a `500 invalidHandlerUnderController` error, so
/// a controller only implements the actions it serves.
#[async_trait]
pub trait RestController: Controller {
    async fn index(&self, _req: Request, _validated: Value) -> HandlerResult {
        Err(ApiError::invalid_handler_under_controller("index", self.name()))
    }

    async fn store(&self, _req: Request, _validated: Value) -> HandlerResult {
        Err(ApiError::invalid_handler_under_controller("store", self.name()))
    }

    async fn show(&self, _req: Request, _validated: Value) -> HandlerResult {
        Err(ApiError::invalid_handler_under_controller("show", self.name()))
    }

    async fn update(&self, _req: Request, _validated: Value) -> HandlerResult {
        Err(ApiError::invalid_handler_under_controller("update", self.name()))
    }

    async fn destroy(&self, _req: Request, _validated: Value) -> HandlerResult {
        Err(ApiError::invalid_handler_under_controller("destroy", self.name()))
    }
}
