//! Per-request tracing: method, path, status, latency.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{Instrument, info, info_span};

use super::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Wraps every request in an `http.request` span and logs its outcome.
///
/// ```rust
/// use std::sync::Arc;
/// use gantry::{Router, middleware::Trace};
///
/// let router = Router::new().layer(Arc::new(Trace));
/// ```
pub struct Trace;

#[async_trait]
impl Middleware for Trace {
    async fn handle(&self, req: Request, next: Next) -> Response {
        let span = info_span!("http.request", method = %req.method(), path = %req.path());
        let started = Instant::now();

        async move {
            let response = next.run(req).await;
            info!(
                status = response.status_code().as_u16(),
                latency_ms = started.elapsed().as_millis() as u64,
                "request completed"
            );
            response
        }
        .instrument(span)
        .await
    }
}
