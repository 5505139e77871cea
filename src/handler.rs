//! What a route resolves to.
//!
//! Every route in a [`Router`](crate::Router) ends in one [`BoxedHandler`].
//! Plain async closures get there through [`Handler`]; the framework's own
//! endpoints (the controller method pipeline, the gateway proxy and
//! middleware chains) implement [`ErasedHandler`] themselves and are
//! shared through [`erase`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// A route endpoint once its concrete type is gone.
#[doc(hidden)]
pub trait ErasedHandler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler>;

pub(crate) fn erase(handler: impl ErasedHandler) -> BoxedHandler {
    Arc::new(handler)
}

impl<F, Fut, R> ErasedHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let output = self(req);
        Box::pin(async move { output.await.into_response() })
    }
}

/// An async function of a [`Request`] that can be mounted on a route.
///
/// Any `Fn(Request) -> impl Future<Output = impl IntoResponse>` qualifies,
/// so a handler can return a [`Response`], a status code, a string or a
/// `Result<Response, ApiError>` whose error becomes a JSONAPI error
/// document:
///
/// ```rust
/// use gantry::{ApiError, Request, Response, Router};
/// use http::StatusCode;
///
/// async fn me(req: Request) -> Result<Response, ApiError> {
///     let id = req.header("x-user").ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized"))?;
///     Ok(Response::builder().json_value(&serde_json::json!({ "id": id })))
/// }
///
/// let router = Router::new().get("/me", me);
/// ```
pub trait Handler: sealed::Sealed {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        erase(self)
    }
}

mod sealed {
    use super::*;

    pub trait Sealed {}

    impl<F, Fut, R> Sealed for F
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + Send + 'static,
    {
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::Value;

    use super::*;
    use crate::api_error::ApiError;

    #[tokio::test]
    async fn closures_answer_with_their_response() {
        let handler = (|req: Request| async move { format!("hello {}", req.original_url()) }).into_boxed_handler();
        let response = handler.call(Request::builder().uri("/world").build()).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"hello /world");
    }

    #[tokio::test]
    async fn failed_results_answer_with_the_error_document() {
        let handler = (|_req: Request| async {
            Err::<Response, _>(ApiError::new(StatusCode::FORBIDDEN, "forbidden"))
        })
        .into_boxed_handler();
        let response = handler.call(Request::builder().uri("/").build()).await;

        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["errors"][0]["title"], "forbidden");
    }

    #[tokio::test]
    async fn erased_handlers_are_shared_between_calls() {
        let handler = erase(|_req: Request| async { StatusCode::ACCEPTED });
        let other = Arc::clone(&handler);

        assert_eq!(handler.call(Request::builder().build()).await.status_code(), StatusCode::ACCEPTED);
        assert_eq!(other.call(Request::builder().build()).await.status_code(), StatusCode::ACCEPTED);
    }
}
