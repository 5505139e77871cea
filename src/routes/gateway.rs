use http::header::{self, HeaderName};
use http::{HeaderMap, Method};
use reqwest::Client;
use serde_json::{Map, json};
use tracing::debug;

use super::Route;
use crate::api_error::ApiError;
use crate::handler::{BoxFuture, ErasedHandler, erase};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::service::{ServiceClient, ServiceError};

/// Headers that describe one connection and are never forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// A reverse proxy that forwards requests to services by path prefix.
///
/// A request to `/<mount>/<service>/<rest>` is forwarded to
/// `<service url>/<rest>`. `position` is the number of `/`-separated
/// segments of the original URL, counting the empty one before the first
/// slash, that precede the service name. The default of `2` fits a gateway
/// mounted one level deep, e.g. under `/api`.
///
/// ```rust
/// use gantry::Router;
/// use gantry::routes::Gateway;
/// use gantry::service::ServiceClient;
/// use http::Method;
///
/// let users = ServiceClient::new("users", "http://users.internal:8080");
/// let gateway = Gateway::new().route(vec![users], &["/users", "/users/{id}"], &[Method::GET]);
/// let router = Router::new().nest("/api", Router::new().group(vec![], vec![gateway]));
/// ```
#[derive(Clone, Debug)]
pub struct Gateway {
    client: Client,
    position: usize,
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    pub fn new() -> Self {
        Self { client: Client::new(), position: 2 }
    }

    pub fn position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Registers every `path × method × service` combination as
    /// `/<service name><path>`.
    pub fn route(&self, services: Vec<ServiceClient>, paths: &[&str], methods: &[Method]) -> Route {
        let mut endpoints = Vec::new();
        for path in paths {
            for method in methods {
                for service in &services {
                    let proxy = Proxy {
                        client: self.client.clone(),
                        position: self.position,
                        service: service.clone(),
                    };
                    endpoints.push((method.clone(), format!("/{}{path}", service.name()), proxy));
                }
            }
        }

        Route::new(move |router, middlewares| {
            for (method, path, proxy) in endpoints {
                router.route(method, &path, erase(proxy), middlewares);
            }
        })
    }
}

struct Proxy {
    client: Client,
    position: usize,
    service: ServiceClient,
}

impl ErasedHandler for Proxy {
    fn call(&self, req: Request) -> BoxFuture {
        let client = self.client.clone();
        let position = self.position;
        let service = self.service.clone();
        Box::pin(async move { forward(client, position, service, req).await.into_response() })
    }
}

async fn forward(client: Client, position: usize, service: ServiceClient, req: Request) -> Result<Response, ApiError> {
    let mut segments = req.original_url().split('/').skip(position);
    let prefix = segments.next().unwrap_or_default();
    if prefix != service.name() {
        let mut meta = Map::new();
        meta.insert("expected".to_owned(), json!(service.name()));
        meta.insert("got".to_owned(), json!(prefix));
        return Err(ApiError::generic_internal_server_error(
            Some("Got invalid service prefix. There might be a misconfiguration of the proxy prefix position.".to_owned()),
            meta,
        ));
    }

    let route = format!("/{}", segments.collect::<Vec<_>>().join("/"));
    let target = format!("{}{route}", service.url());

    let mut headers = req.headers().clone();
    strip(&mut headers);
    headers.remove(header::HOST);
    headers.extend(service.headers().await);

    debug!(service = service.name(), %target, "forwarding request");
    let upstream = client
        .request(req.method().clone(), &target)
        .headers(headers)
        .body(req.body().clone())
        .send()
        .await
        .map_err(|e| ServiceError::transport(service.name(), &route, e))?;

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip(&mut headers);
    let body = upstream
        .bytes()
        .await
        .map_err(|e| ServiceError::transport(service.name(), &route, e))?;

    Ok(Response::from_parts(status, headers, body))
}

/// Removes hop-by-hop headers and the body length, which the outgoing side
/// recomputes.
fn strip(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove(header::CONTENT_LENGTH);
}
