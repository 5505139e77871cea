use std::sync::Arc;

use http::Method;
use serde_json::Value;

use super::{Action, Route, Routes};
use crate::controller::RestController;
use crate::request::Request;
use crate::validator::{BaseValidator, Validator};

/// One endpoint of a REST resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RestAction {
    Index,
    Store,
    Show,
    Update,
    Destroy,
}

impl RestAction {
    pub const ALL: [RestAction; 5] = [Self::Index, Self::Store, Self::Show, Self::Update, Self::Destroy];

    pub fn method(self) -> Method {
        match self {
            Self::Index | Self::Show => Method::GET,
            Self::Store => Method::POST,
            Self::Update => Method::PUT,
            Self::Destroy => Method::DELETE,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Index | Self::Store => "/",
            Self::Show | Self::Update | Self::Destroy => "/{id}",
        }
    }

    fn action<C: RestController>(self) -> Arc<dyn Action<C>> {
        match self {
            Self::Index => Arc::new(|c: Arc<C>, req: Request, v: Value| async move { c.index(req, v).await }),
            Self::Store => Arc::new(|c: Arc<C>, req: Request, v: Value| async move { c.store(req, v).await }),
            Self::Show => Arc::new(|c: Arc<C>, req: Request, v: Value| async move { c.show(req, v).await }),
            Self::Update => Arc::new(|c: Arc<C>, req: Request, v: Value| async move { c.update(req, v).await }),
            Self::Destroy => Arc::new(|c: Arc<C>, req: Request, v: Value| async move { c.destroy(req, v).await }),
        }
    }
}

/// The validator of each REST endpoint; [`BaseValidator`] by default.
#[derive(Clone)]
pub struct RestValidators {
    pub index: Arc<dyn Validator>,
    pub store: Arc<dyn Validator>,
    pub show: Arc<dyn Validator>,
    pub update: Arc<dyn Validator>,
    pub destroy: Arc<dyn Validator>,
}

impl Default for RestValidators {
    fn default() -> Self {
        Self {
            index: Arc::new(BaseValidator),
            store: Arc::new(BaseValidator),
            show: Arc::new(BaseValidator),
            update: Arc::new(BaseValidator),
            destroy: Arc::new(BaseValidator),
        }
    }
}

impl RestValidators {
    pub fn index(mut self, validator: impl Validator) -> Self {
        self.index = Arc::new(validator);
        self
    }

    pub fn store(mut self, validator: impl Validator) -> Self {
        self.store = Arc::new(validator);
        self
    }

    pub fn show(mut self, validator: impl Validator) -> Self {
        self.show = Arc::new(validator);
        self
    }

    pub fn update(mut self, validator: impl Validator) -> Self {
        self.update = Arc::new(validator);
        self
    }

    pub fn destroy(mut self, validator: impl Validator) -> Self {
        self.destroy = Arc::new(validator);
        self
    }

    fn of(&self, action: RestAction) -> Arc<dyn Validator> {
        Arc::clone(match action {
            RestAction::Index => &self.index,
            RestAction::Store => &self.store,
            RestAction::Show => &self.show,
            RestAction::Update => &self.update,
            RestAction::Destroy => &self.destroy,
        })
    }
}

impl<C: RestController> Routes<C> {
    /// The REST routes of one resource, registered together as a single
    /// route: `GET /`, `POST /`, `GET /{id}`, `PUT /{id}` and
    /// `DELETE /{id}`, restricted to `components`.
    ///
    /// Mount the result under the resource prefix with
    /// [`Router::nest`](crate::Router::nest).
    pub fn rest(&self, validators: RestValidators, components: &[RestAction]) -> Route {
        let routes: Vec<Route> = RestAction::ALL
            .into_iter()
            .filter(|action| components.contains(action))
            .map(|action| {
                self.endpoint_route(action.method(), action.path(), action.action::<C>(), validators.of(action))
            })
            .collect();

        Route::new(move |router, middlewares| {
            for route in routes {
                route.register(router, middlewares);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use http::StatusCode;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::controller::{Controller, HandlerResult};
    use crate::router::Router;

    struct Posts;
    impl Controller for Posts {}

    #[async_trait]
    impl RestController for Posts {
        async fn index(&self, _req: Request, _validated: Value) -> HandlerResult {
            self.response(StatusCode::OK).data(&json!([{ "id": "1" }]))
        }

        async fn show(&self, req: Request, _validated: Value) -> HandlerResult {
            self.response(StatusCode::OK).data(&json!({ "id": req.param("id") }))
        }
    }

    fn posts(components: &[RestAction]) -> Router {
        let routes = Routes::new(Posts);
        Router::new().nest("/posts", Router::new().group(vec![], vec![routes.rest(RestValidators::default(), components)]))
    }

    #[rstest]
    #[case(Method::GET, "/posts", StatusCode::OK)]
    #[case(Method::GET, "/posts/7", StatusCode::OK)]
    #[case(Method::POST, "/posts", StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(Method::PUT, "/posts/7", StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(Method::DELETE, "/posts/7", StatusCode::INTERNAL_SERVER_ERROR)]
    #[tokio::test]
    async fn every_component_is_registered(#[case] method: Method, #[case] uri: &str, #[case] status: StatusCode) {
        let response = posts(&RestAction::ALL).call(Request::builder().method(method).uri(uri).build()).await;
        assert_eq!(response.status_code(), status);
    }

    #[tokio::test]
    async fn show_receives_the_id() {
        let response = posts(&RestAction::ALL).call(Request::builder().uri("/posts/7").build()).await;
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["data"]["id"], "7");
    }

    #[tokio::test]
    async fn unimplemented_actions_name_the_handler() {
        let req = Request::builder().method(Method::DELETE).uri("/posts/7").build();
        let response = posts(&RestAction::ALL).call(req).await;
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["errors"][0]["title"], "invalidHandlerUnderController");
        assert_eq!(body["errors"][0]["meta"]["controller"], "Posts");
    }

    #[tokio::test]
    async fn unselected_components_are_not_registered() {
        let router = posts(&[RestAction::Index]);
        let response = router.call(Request::builder().uri("/posts/7").build()).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }
}
