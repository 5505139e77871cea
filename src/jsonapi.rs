//! JSONAPI document responders.
//!
//! A [`JsonApi`] is bound to a status code and turns data into a JSONAPI
//! top-level document:
//!
//! ```rust
//! use gantry::jsonapi::{Extra, JsonApi};
//! use http::StatusCode;
//! use serde_json::json;
//!
//! let ok = JsonApi::new(StatusCode::OK);
//! ok.data(&json!([{ "id": 1 }]));
//! ok.meta(json!({ "count": 1 }));
//! JsonApi::new(StatusCode::CREATED).reference("42", "users", Extra::default());
//! ```

use http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::api_error::ApiError;
use crate::response::Response;
use crate::transform::{OneOrMany, Transform};

/// Optional top-level members added to a document.
#[derive(Clone, Debug, Default)]
pub struct Extra {
    pub meta: Option<Value>,
    pub links: Option<Map<String, Value>>,
    /// Members merged over the resource object of a [`JsonApi::reference`].
    pub data_attr: Option<Map<String, Value>>,
}

impl Extra {
    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn links(mut self, links: Map<String, Value>) -> Self {
        self.links = Some(links);
        self
    }

    pub fn data_attr(mut self, data_attr: Map<String, Value>) -> Self {
        self.data_attr = Some(data_attr);
        self
    }
}

/// One page of a paginated collection.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub last: u64,
    pub next: Option<u64>,
    pub prev: Option<u64>,
}

#[derive(Serialize)]
struct Document<'a, T: Serialize + ?Sized> {
    data: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<&'a Value>,
}

/// Sends JSONAPI documents with a fixed status code.
#[derive(Clone, Copy, Debug)]
pub struct JsonApi {
    status: StatusCode,
}

impl JsonApi {
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// `{"data": data}`.
    pub fn data<T: Serialize + ?Sized>(&self, data: &T) -> Result<Response, ApiError> {
        self.data_with(data, Extra::default())
    }

    /// `{"data": data, "links": .., "meta": ..}`, optional members only when given.
    pub fn data_with<T: Serialize + ?Sized>(&self, data: &T, extra: Extra) -> Result<Response, ApiError> {
        let document = Document { data, links: extra.links.as_ref(), meta: extra.meta.as_ref() };
        self.send(&document)
    }

    /// Runs `input` through `transform` and sends the result as `data`.
    pub fn transform<Tr: Transform>(
        &self,
        transform: &Tr,
        input: OneOrMany<Tr::Input>,
        extra: Extra,
    ) -> Result<Response, ApiError> {
        self.data_with(&transform.arbitrary(input), extra)
    }

    /// Sends one page of data. `links.pagination` becomes
    /// `{first: 1, last, next, prev}`, merged over any given links. `next`
    /// and `prev` are left out when there is no such page.
    pub fn pagination<T: Serialize>(&self, page: Page<T>, extra: Extra) -> Result<Response, ApiError> {
        let mut pagination = Map::new();
        pagination.insert("first".to_owned(), json!(1));
        pagination.insert("last".to_owned(), json!(page.last));
        if let Some(next) = page.next {
            pagination.insert("next".to_owned(), json!(next));
        }
        if let Some(prev) = page.prev {
            pagination.insert("prev".to_owned(), json!(prev));
        }

        let mut links = extra.links.unwrap_or_default();
        links.insert("pagination".to_owned(), Value::Object(pagination));
        self.data_with(&page.data, Extra { links: Some(links), ..extra })
    }

    /// A meta-only document, `{"meta": meta}`.
    pub fn meta(&self, meta: Value) -> Result<Response, ApiError> {
        self.send(&json!({ "meta": meta }))
    }

    /// A reference to a resource:
    /// `{"data": {"id", "type", "links": {"self": "/type/id"}}}`, with
    /// `data_attr` merged over the resource object.
    pub fn reference(&self, id: &str, kind: &str, extra: Extra) -> Result<Response, ApiError> {
        let mut data = Map::new();
        data.insert("id".to_owned(), Value::from(id));
        data.insert("type".to_owned(), Value::from(kind));
        data.insert("links".to_owned(), json!({ "self": format!("/{kind}/{id}") }));
        if let Some(attrs) = extra.data_attr {
            data.extend(attrs);
        }

        let mut document = Map::new();
        document.insert("data".to_owned(), Value::Object(data));
        if let Some(meta) = extra.meta {
            document.insert("meta".to_owned(), meta);
        }
        if let Some(links) = extra.links {
            document.insert("links".to_owned(), Value::Object(links));
        }
        self.send(&document)
    }

    fn send<T: Serialize + ?Sized>(&self, document: &T) -> Result<Response, ApiError> {
        let body = serde_json::to_vec(document).map_err(|e| {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "invalidJsonApiDocument")
                .detail("The response document could not be serialized")
                .meta("reason", e.to_string())
        })?;
        Ok(Response::builder().status(self.status).json(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(response: Result<Response, ApiError>) -> Value {
        serde_json::from_slice(response.unwrap().body()).unwrap()
    }

    #[test]
    fn data_omits_missing_optionals() {
        let document = body(JsonApi::new(StatusCode::OK).data(&json!({ "id": 1 })));
        assert_eq!(document, json!({ "data": { "id": 1 } }));
    }

    #[test]
    fn data_with_adds_meta_and_links() {
        let mut links = Map::new();
        links.insert("self".into(), json!("/users"));
        let extra = Extra::default().meta(json!({ "total": 2 })).links(links);

        let document = body(JsonApi::new(StatusCode::OK).data_with(&json!([1, 2]), extra));
        assert_eq!(document["meta"]["total"], 2);
        assert_eq!(document["links"]["self"], "/users");
    }

    #[test]
    fn pagination_merges_links() {
        let mut links = Map::new();
        links.insert("self".into(), json!("/users?page=2"));
        let page = Page { data: vec![json!({ "id": 3 })], last: 4, next: Some(3), prev: Some(1) };

        let document = body(JsonApi::new(StatusCode::OK).pagination(page, Extra::default().links(links)));
        assert_eq!(document["links"]["self"], "/users?page=2");
        assert_eq!(document["links"]["pagination"], json!({ "first": 1, "last": 4, "next": 3, "prev": 1 }));
        assert_eq!(document["data"][0]["id"], 3);
    }

    #[test]
    fn pagination_leaves_out_missing_pages() {
        let page = Page { data: vec![json!({ "id": 1 })], last: 1, next: None, prev: None };

        let document = body(JsonApi::new(StatusCode::OK).pagination(page, Extra::default()));
        assert_eq!(document["links"]["pagination"], json!({ "first": 1, "last": 1 }));
    }

    struct Named;

    impl Transform for Named {
        type Input = Value;
        type Output = Value;

        fn morph(&self, user: Value) -> Value {
            json!({ "id": user["id"], "name": user["name"] })
        }
    }

    #[test]
    fn transform_morphs_items_and_collections() {
        let user = json!({ "id": 1, "name": "ada", "password": "x" });
        let ok = JsonApi::new(StatusCode::OK);

        let one = body(ok.transform(&Named, OneOrMany::One(user.clone()), Extra::default()));
        assert_eq!(one, json!({ "data": { "id": 1, "name": "ada" } }));

        let many = body(ok.transform(&Named, vec![user].into(), Extra::default().meta(json!({ "total": 1 }))));
        assert_eq!(many, json!({ "data": [{ "id": 1, "name": "ada" }], "meta": { "total": 1 } }));
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot serialize"))
        }
    }

    #[test]
    fn unserializable_data_is_an_invalid_document() {
        let error = JsonApi::new(StatusCode::OK).data(&Unserializable).unwrap_err();
        assert_eq!(error.status, 500);
        assert_eq!(error.title, "invalidJsonApiDocument");
        assert!(error.meta["reason"].as_str().unwrap().contains("cannot serialize"));
    }

    #[test]
    fn meta_only_document() {
        let response = JsonApi::new(StatusCode::ACCEPTED).meta(json!({ "queued": true })).unwrap();
        assert_eq!(response.status_code(), StatusCode::ACCEPTED);
        assert_eq!(serde_json::from_slice::<Value>(response.body()).unwrap(), json!({ "meta": { "queued": true } }));
    }

    #[test]
    fn reference_builds_self_link_and_merges_data_attr() {
        let mut attrs = Map::new();
        attrs.insert("attributes".into(), json!({ "name": "ada" }));
        attrs.insert("type".into(), json!("people"));

        let document = body(JsonApi::new(StatusCode::CREATED).reference("7", "users", Extra::default().data_attr(attrs)));
        assert_eq!(document["data"]["id"], "7");
        assert_eq!(document["data"]["links"]["self"], "/users/7");
        assert_eq!(document["data"]["type"], "people");
        assert_eq!(document["data"]["attributes"]["name"], "ada");
        assert!(document.get("meta").is_none());
    }
}
