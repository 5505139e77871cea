//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{Extensions, HeaderMap, Method, Uri};
use hyper::upgrade::OnUpgrade;
use serde::de::DeserializeOwned;

use crate::api_error::ApiError;

/// An incoming HTTP request with its body fully buffered.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) extensions: Extensions,
    pub(crate) upgrade: Option<OnUpgrade>,
}

impl Request {
    pub(crate) fn from_hyper(
        parts: http::request::Parts,
        body: Bytes,
        upgrade: OnUpgrade,
        remote_addr: SocketAddr,
    ) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            remote_addr: Some(remote_addr),
            extensions: parts.extensions,
            upgrade: Some(upgrade),
        }
    }

    /// Builder for requests constructed in-process, e.g. in tests driving
    /// [`Router::call`](crate::Router::call).
    pub fn builder() -> RequestBuilder {
        RequestBuilder {
            request: Self {
                method: Method::GET,
                uri: Uri::from_static("/"),
                headers: HeaderMap::new(),
                body: Bytes::new(),
                params: HashMap::new(),
                remote_addr: None,
                extensions: Extensions::new(),
                upgrade: None,
            },
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Path and query exactly as the client sent them, e.g. `/users/7?full=1`.
    pub fn original_url(&self) -> &str {
        self.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    /// Deserializes the JSON body.
    ///
    /// # Errors
    ///
    /// A `400 invalidRequestBody` error when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(ApiError::invalid_request_body)
    }

    /// Takes the connection upgrade handle. Only the first call on a request
    /// served by [`Server`](crate::Server) returns `Some`.
    pub fn take_upgrade(&mut self) -> Option<OnUpgrade> {
        self.upgrade.take()
    }
}

/// Fluent builder for [`Request`]. Obtain via [`Request::builder()`].
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.request.method = method;
        self
    }

    /// # Panics
    ///
    /// Panics if `uri` is not a valid request target.
    pub fn uri(mut self, uri: &str) -> Self {
        self.request.uri = uri.parse().unwrap_or_else(|e| panic!("invalid uri `{uri}`: {e}"));
        self
    }

    /// # Panics
    ///
    /// Panics if the name or value is not valid HTTP.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let name = HeaderName::try_from(name).unwrap_or_else(|e| panic!("invalid header name `{name}`: {e}"));
        let value = HeaderValue::try_from(value).unwrap_or_else(|e| panic!("invalid header value `{value}`: {e}"));
        self.request.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Serializes `value` as the JSON body and sets `content-type`.
    pub fn json<T: serde::Serialize>(self, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        self.header("content-type", "application/json").body(body)
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.request.remote_addr = Some(addr);
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_url_keeps_the_query() {
        let req = Request::builder().uri("/users/7?full=1").build();
        assert_eq!(req.path(), "/users/7");
        assert_eq!(req.query(), Some("full=1"));
        assert_eq!(req.original_url(), "/users/7?full=1");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::builder().header("X-Request-Id", "abc").build();
        assert_eq!(req.header("x-request-id"), Some("abc"));
    }

    #[test]
    fn json_body_errors_are_bad_requests() {
        let req = Request::builder().body("{not json").build();
        let error = req.json::<serde_json::Value>().unwrap_err();
        assert_eq!(error.status, 400);
        assert_eq!(error.title, "invalidRequestBody");
    }
}
