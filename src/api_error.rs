//! The JSONAPI error object and the error convention built around it.
//!
//! Every failure a handler reports travels as an [`ApiError`]. Returning
//! `Err(error)` from a handler is the "throw": the framework renders
//! `{"errors": [error.compact()]}` with the error's status code.
//!
//! ```rust
//! use gantry::{ApiError, Request};
//! use http::StatusCode;
//!
//! fn find(req: &Request, id: u32) -> Result<u32, ApiError> {
//!     if id == 0 {
//!         return Err(ApiError::new(StatusCode::NOT_FOUND, "userNotFound")
//!             .detail("no user with id 0")
//!             .meta("route", req.original_url()));
//!     }
//!     Ok(id)
//! }
//! ```

use std::fmt;

use http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};
use uuid::Uuid;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

const GENERIC_INTERNAL_TITLE: &str = "genericInternalServerError";

/// A JSONAPI error object.
///
/// See <https://jsonapi.org/format/#error-objects>. `meta` is always an
/// object and is always part of the compact form; every other optional
/// member only appears when set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApiError {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    pub meta: Map<String, Value>,
}

impl Default for ApiError {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            links: None,
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            code: None,
            title: GENERIC_INTERNAL_TITLE.to_owned(),
            detail: None,
            source: None,
            meta: Map::new(),
        }
    }
}

impl ApiError {
    /// A fresh error with a new id, the given status and title.
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self { status: status.as_u16(), title: title.into(), ..Self::default() }
    }

    /// Builds an error from a feed object.
    ///
    /// Known members override the defaults (an `id` in the feed replaces the
    /// generated one). Unknown members, `null`s and members of the wrong JSON
    /// type are ignored.
    pub fn from_feed(feed: &Map<String, Value>) -> Self {
        let mut error = Self::default();
        for (key, value) in feed {
            match (key.as_str(), value) {
                (_, Value::Null) => {}
                ("id", Value::String(id)) => error.id = id.clone(),
                ("links", links) => error.links = Some(links.clone()),
                ("status", status) => {
                    if let Some(status) = status_from_value(status) {
                        error.status = status;
                    }
                }
                ("code", code @ (Value::String(_) | Value::Number(_))) => {
                    error.code = Some(code.clone());
                }
                ("title", Value::String(title)) => error.title = title.clone(),
                ("detail", Value::String(detail)) => error.detail = Some(detail.clone()),
                ("source", source) => error.source = Some(source.clone()),
                ("meta", Value::Object(meta)) => error.meta = meta.clone(),
                _ => {}
            }
        }
        error
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Custom internal code, either a string or a number.
    pub fn code(mut self, code: impl Into<Value>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn source(mut self, source: Value) -> Self {
        self.source = Some(source);
        self
    }

    pub fn links(mut self, links: Value) -> Self {
        self.links = Some(links);
        self
    }

    /// Sets one `meta` member, replacing any previous value.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Replaces the whole `meta` object.
    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    /// The status as an [`http::StatusCode`]; out-of-range codes become 500.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The compact JSONAPI representation: set members only.
    pub fn compact(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// The full error document, `{"errors": [compact]}`.
    pub fn document(&self) -> Value {
        serde_json::json!({ "errors": [self.compact()] })
    }

    // ── Catalogue ───────────────────────────────────────────────────────────

    /// 500 `internalServerError`. Without a detail, the detail reads
    /// "The server encountered an exception."
    pub fn generic_internal_server_error(detail: Option<String>, meta: Map<String, Value>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internalServerError")
            .detail(detail.unwrap_or_else(|| "The server encountered an exception.".to_owned()))
            .with_meta(meta)
    }

    /// The fallback error thrown when a handler fails without naming one.
    pub fn internal_for_route(route: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_INTERNAL_TITLE)
            .detail("The server encounter an exception, check meta for internal error details")
            .meta("route", route)
    }

    pub fn invalid_handler_under_controller(handler: &str, controller: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "invalidHandlerUnderController")
            .detail(format!(
                "{handler} handler does not exist under controller or it is not a callable function"
            ))
            .meta("controller", controller)
    }

    pub fn route_not_found(method: &http::Method, route: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "routeNotFound")
            .detail(format!("No route matches {method} {route}"))
            .meta("route", route)
    }

    pub fn method_not_allowed(method: &http::Method, route: &str) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "methodNotAllowed")
            .detail(format!("{method} is not allowed on {route}"))
            .meta("route", route)
    }

    pub fn invalid_request_body(reason: impl fmt::Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalidRequestBody")
            .detail("The request body could not be parsed")
            .meta("reason", reason.to_string())
    }

    /// 401 `unauthorized`, with the reason the request was refused.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
            .detail("The request cannot be authorized")
            .meta("reason", reason.into())
    }

    pub fn missing_jwt() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missingJWT")
            .detail("The request cannot be authorized due to missing JWT Authorization")
    }

    pub fn bad_jwt(token: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "badJWT")
            .detail("The request cannot be authorized due to bad JWT Authorization")
            .meta("givenToken", token)
    }

    pub fn invalid_jwt(token: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalidJWT")
            .detail("The request cannot be authorized due to invalid or expired JWT Authorization")
            .meta("givenToken", token)
    }
}

fn status_from_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.status)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(id = %self.id, title = %self.title, detail = ?self.detail, "responding with error");
        } else {
            debug!(id = %self.id, title = %self.title, status = self.status, "responding with error");
        }
        Response::builder().status(status).json_value(&self.document())
    }
}

// ── Convention ────────────────────────────────────────────────────────────────

/// Fails the request with `error`, or with the generic internal error for
/// the request's route when none is given.
pub fn throw<T>(req: &Request, error: Option<ApiError>) -> Result<T, ApiError> {
    Err(error.unwrap_or_else(|| ApiError::internal_for_route(req.original_url())))
}

/// Returns a mapper that turns any caught failure into `error` (or the
/// route's generic internal error) with `meta.internalError` set to the
/// failure's message.
///
/// ```rust,ignore
/// let user = repo.show(id).await.map_err(catcher(&req, None))?;
/// ```
pub fn catcher<E: fmt::Display>(
    req: &Request,
    error: Option<ApiError>,
) -> impl FnOnce(E) -> ApiError + use<E> {
    let error = error.unwrap_or_else(|| ApiError::internal_for_route(req.original_url()));
    move |caught| error.meta("internalError", caught.to_string())
}
