//! Service-to-service HTTP client.
//!
//! A [`ServiceClient`] calls another service of the system by relative
//! route. Failures come back as [`ServiceError`], which converts into an
//! [`ApiError`] that records the hop in `meta.serviceScope`, so an error
//! raised three services deep still reaches the client as the original
//! JSONAPI error plus the trail it travelled.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use crate::api_error::ApiError;

/// Supplies the default headers of every request made to a service, e.g.
/// an inter-service authorization token.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    async fn headers(&self) -> HeaderMap;
}

/// A failed service call.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service answered with a non-2xx status.
    #[error("{service} returned {status} when calling {route}")]
    Status {
        service: String,
        route: String,
        status: StatusCode,
        body: Bytes,
    },

    /// The request was sent but no response came back.
    #[error("{service} did not respond at {route} request")]
    Unreachable {
        service: String,
        route: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request could not be built.
    #[error("failed to set up {service} {route} request")]
    Setup {
        service: String,
        route: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ServiceError {
    pub(crate) fn transport(service: &str, route: &str, source: reqwest::Error) -> Self {
        let (service, route) = (service.to_owned(), route.to_owned());
        if source.is_builder() {
            Self::Setup { service, route, source }
        } else {
            Self::Unreachable { service, route, source }
        }
    }
}

/// One `{service, route}` entry of a `serviceScope` trail.
pub(crate) fn scope_entry(service: &str, route: &str) -> Value {
    json!({ "service": service, "route": route })
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Status { service, route, status, body } => {
                let parsed: Option<Value> = serde_json::from_slice(&body).ok();
                if let Some(feed) = parsed.as_ref().and_then(first_jsonapi_error) {
                    let mut error = ApiError::from_feed(feed);
                    let mut trail = match error.meta.remove("serviceScope") {
                        Some(Value::Array(trail)) => trail,
                        _ => Vec::new(),
                    };
                    trail.push(scope_entry(&service, &route));
                    return error.meta("serviceScope", trail);
                }

                let original = parsed
                    .unwrap_or_else(|| Value::String(String::from_utf8_lossy(&body).into_owned()));
                ApiError::new(status, "serviceRequestError")
                    .detail(format!("{service} returned an error when calling {route}"))
                    .meta("originalError", original)
                    .meta("serviceScope", json!([scope_entry(&service, &route)]))
            }
            ServiceError::Unreachable { service, route, .. } => {
                let mut meta = Map::new();
                meta.insert("serviceScope".to_owned(), json!([scope_entry(&service, &route)]));
                ApiError::generic_internal_server_error(
                    Some(format!("{service} did not respond at {route} request.")),
                    meta,
                )
            }
            ServiceError::Setup { service, route, source } => {
                let mut meta = Map::new();
                meta.insert("serviceScope".to_owned(), json!([scope_entry(&service, &route)]));
                meta.insert("message".to_owned(), Value::String(source.to_string()));
                ApiError::generic_internal_server_error(
                    Some(format!("Something happened while setting up {service} {route} request.")),
                    meta,
                )
            }
        }
    }
}

/// Returns the first error object of a JSONAPI error document.
///
/// The document must carry a non-empty `errors` array of objects whose
/// `id`, `status`, `title` and `detail` members, when present, are of the
/// JSONAPI types. `status` may be a number or a numeric string.
fn first_jsonapi_error(document: &Value) -> Option<&Map<String, Value>> {
    let errors = document.get("errors")?.as_array()?;
    let well_formed = |error: &Value| {
        let Some(error) = error.as_object() else { return false };
        let typed = |key: &str, check: fn(&Value) -> bool| error.get(key).is_none_or(check);
        typed("id", Value::is_string)
            && typed("status", is_numeric)
            && typed("title", Value::is_string)
            && typed("detail", Value::is_string)
    };
    if errors.is_empty() || !errors.iter().all(well_formed) {
        return None;
    }
    errors.first()?.as_object()
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<u16>().is_ok(),
        _ => false,
    }
}

/// A client bound to one service of the system.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), gantry::ApiError> {
/// use gantry::service::ServiceClient;
/// use serde_json::json;
///
/// let users = ServiceClient::new("users", "http://users.internal:8080");
/// let created = users.post("/users", &json!({ "name": "ada" })).await?;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct ServiceClient {
    name: String,
    url: String,
    http: Client,
    headers: Option<Arc<dyn HeaderSource>>,
}

impl ServiceClient {
    /// `name` doubles as the gateway prefix of the service; `url` is its
    /// absolute base URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into(), http: Client::new(), headers: None }
    }

    pub fn with_headers(mut self, source: impl HeaderSource + 'static) -> Self {
        self.headers = Some(Arc::new(source));
        self
    }

    /// Shares an existing `reqwest` connection pool.
    pub fn with_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn url(&self) -> &str { &self.url }

    /// The default headers of every request to this service.
    pub async fn headers(&self) -> HeaderMap {
        match &self.headers {
            Some(source) => source.headers().await,
            None => HeaderMap::new(),
        }
    }

    /// Sends a `method` request to `url + route`. `customize` receives the
    /// prepared request (default headers already set) and may add a body,
    /// a query or a timeout.
    ///
    /// # Errors
    ///
    /// Any transport failure or non-2xx status.
    pub async fn method<F>(&self, method: Method, route: &str, customize: F) -> Result<reqwest::Response, ServiceError>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let request = self
            .http
            .request(method.clone(), format!("{}{route}", self.url))
            .headers(self.headers().await);

        debug!(service = %self.name, %method, route, "calling service");
        let response = customize(request)
            .send()
            .await
            .map_err(|e| ServiceError::transport(&self.name, route, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ServiceError::transport(&self.name, route, e))?;
        Err(ServiceError::Status {
            service: self.name.clone(),
            route: route.to_owned(),
            status,
            body,
        })
    }

    pub async fn get(&self, route: &str) -> Result<reqwest::Response, ServiceError> {
        self.method(Method::GET, route, |r| r).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, route: &str, data: &T) -> Result<reqwest::Response, ServiceError> {
        self.method(Method::POST, route, |r| r.json(data)).await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, route: &str, data: &T) -> Result<reqwest::Response, ServiceError> {
        self.method(Method::PUT, route, |r| r.json(data)).await
    }

    pub async fn patch<T: Serialize + ?Sized>(&self, route: &str, data: &T) -> Result<reqwest::Response, ServiceError> {
        self.method(Method::PATCH, route, |r| r.json(data)).await
    }

    /// Sends `data`, or `{}` when `None`, as the JSON body of a DELETE.
    pub async fn delete<T: Serialize + ?Sized>(&self, route: &str, data: Option<&T>) -> Result<reqwest::Response, ServiceError> {
        match data {
            Some(data) => self.method(Method::DELETE, route, |r| r.json(data)).await,
            None => self.method(Method::DELETE, route, |r| r.json(&Map::new())).await,
        }
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("name", &self.name)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;
    use crate::request::Request;
    use crate::response::{IntoResponse, Response};
    use crate::router::Router;
    use crate::testing::{spawn_server, unused_addr};

    struct Token;

    #[async_trait]
    impl HeaderSource for Token {
        async fn headers(&self) -> HeaderMap {
            let mut headers = HeaderMap::new();
            headers.insert("authorization", HeaderValue::from_static("Bearer internal"));
            headers
        }
    }

    fn upstream() -> Router {
        Router::new()
            .get("/whoami", |req: Request| async move {
                Response::text(req.header("authorization").unwrap_or("anonymous").to_owned())
            })
            .delete("/echo", |req: Request| async move { Response::json(req.body().clone()) })
            .get("/jsonapi-error", |_req: Request| async {
                ApiError::new(StatusCode::NOT_FOUND, "userNotFound")
                    .meta("serviceScope", json!([{ "service": "auth", "route": "/check" }]))
                    .into_response()
            })
            .get("/string-status-error", |_req: Request| async {
                let body = json!({ "errors": [{ "status": "404", "title": "userNotFound" }] });
                Response::builder().status(StatusCode::NOT_FOUND).json(body.to_string())
            })
            .get("/plain-error", |_req: Request| async {
                Response::builder().status(StatusCode::BAD_GATEWAY).text("upstream exploded")
            })
            .get("/json-error", |_req: Request| async {
                Response::builder().status(StatusCode::CONFLICT).json(r#"{"reason":"taken"}"#)
            })
    }

    #[tokio::test]
    async fn default_headers_are_sent() {
        let (url, _stop) = spawn_server(upstream()).await;
        let client = ServiceClient::new("users", url).with_headers(Token);

        let body = client.get("/whoami").await.unwrap().text().await.unwrap();
        assert_eq!(body, "Bearer internal");
    }

    #[tokio::test]
    async fn delete_sends_an_empty_object_by_default() {
        let (url, _stop) = spawn_server(upstream()).await;
        let client = ServiceClient::new("users", url);

        let body: Value = client.delete::<Value>("/echo", None).await.unwrap().json().await.unwrap();
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn jsonapi_errors_are_rebuilt_with_the_hop_appended() {
        let (url, _stop) = spawn_server(upstream()).await;
        let client = ServiceClient::new("users", url);

        let error: ApiError = client.get("/jsonapi-error").await.unwrap_err().into();
        assert_eq!(error.status, 404);
        assert_eq!(error.title, "userNotFound");
        assert_eq!(
            error.meta["serviceScope"],
            json!([
                { "service": "auth", "route": "/check" },
                { "service": "users", "route": "/jsonapi-error" }
            ])
        );
    }

    #[tokio::test]
    async fn string_statuses_are_still_jsonapi_errors() {
        let (url, _stop) = spawn_server(upstream()).await;
        let client = ServiceClient::new("users", url);

        let error: ApiError = client.get("/string-status-error").await.unwrap_err().into();
        assert_eq!(error.status, 404);
        assert_eq!(error.title, "userNotFound");
        assert_eq!(error.meta["serviceScope"], json!([{ "service": "users", "route": "/string-status-error" }]));
        assert!(error.meta.get("originalError").is_none());
    }

    #[tokio::test]
    async fn other_error_bodies_become_service_request_errors() {
        let (url, _stop) = spawn_server(upstream()).await;
        let client = ServiceClient::new("users", url);

        let error: ApiError = client.get("/plain-error").await.unwrap_err().into();
        assert_eq!(error.status, 502);
        assert_eq!(error.title, "serviceRequestError");
        assert_eq!(error.detail.as_deref(), Some("users returned an error when calling /plain-error"));
        assert_eq!(error.meta["originalError"], "upstream exploded");

        let error: ApiError = client.get("/json-error").await.unwrap_err().into();
        assert_eq!(error.meta["originalError"], json!({ "reason": "taken" }));
    }

    #[tokio::test]
    async fn unreachable_services_are_internal_errors() {
        let client = ServiceClient::new("users", format!("http://{}", unused_addr().await));

        let error: ApiError = client.get("/users").await.unwrap_err().into();
        assert_eq!(error.status, 500);
        assert_eq!(error.detail.as_deref(), Some("users did not respond at /users request."));
        assert_eq!(error.meta["serviceScope"], json!([{ "service": "users", "route": "/users" }]));
    }

    #[tokio::test]
    async fn malformed_urls_are_setup_errors() {
        let client = ServiceClient::new("users", "not a url");

        let error = client.get("/users").await.unwrap_err();
        assert!(matches!(error, ServiceError::Setup { .. }));

        let error = ApiError::from(error);
        assert_eq!(error.status, 500);
        assert_eq!(error.detail.as_deref(), Some("Something happened while setting up users /users request."));
        assert_eq!(error.meta["serviceScope"], json!([{ "service": "users", "route": "/users" }]));
        assert!(error.meta["message"].is_string());
    }

    #[test]
    fn malformed_error_documents_are_not_jsonapi() {
        assert!(first_jsonapi_error(&json!({ "errors": [] })).is_none());
        assert!(first_jsonapi_error(&json!({ "errors": [{ "status": "404" }] })).is_some());
        assert!(first_jsonapi_error(&json!({ "errors": [{ "status": "not found" }] })).is_none());
        assert!(first_jsonapi_error(&json!({ "errors": [{ "status": true }] })).is_none());
        assert!(first_jsonapi_error(&json!({ "errors": ["nope"] })).is_none());
        assert!(first_jsonapi_error(&json!({ "errors": [{ "status": 404, "title": "x" }] })).is_some());
    }
}
