//! Request validators.
//!
//! A validator runs before a controller action and produces the
//! "validated" object handed to it. Failing validation short-circuits the
//! request with the returned error.

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::api_error::{self, ApiError};
use crate::request::Request;

#[async_trait]
pub trait Validator: Send + Sync + 'static {
    /// Human readable name, used in logs.
    fn name(&self) -> &str {
        "Base validator"
    }

    async fn validate(&self, _req: &Request) -> Result<Value, ApiError> {
        Ok(Value::Object(Map::new()))
    }

    fn throw<T>(&self, req: &Request, error: Option<ApiError>) -> Result<T, ApiError>
    where
        Self: Sized,
    {
        api_error::throw(req, error)
    }

    fn catcher<E: fmt::Display>(&self, req: &Request, error: Option<ApiError>) -> impl FnOnce(E) -> ApiError
    where
        Self: Sized,
    {
        api_error::catcher(req, error)
    }
}

/// Accepts every request; the validated object is `{}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BaseValidator;

impl Validator for BaseValidator {}

/// Validates that the body deserializes into `T`, and hands the parsed
/// value on as the validated object.
///
/// ```rust
/// use gantry::validator::JsonBody;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize, Serialize)]
/// struct NewUser { name: String }
///
/// let validator = JsonBody::<NewUser>::new("New user validator");
/// ```
pub struct JsonBody<T> {
    name: String,
    _body: PhantomData<fn() -> T>,
}

impl<T> JsonBody<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), _body: PhantomData }
    }
}

#[async_trait]
impl<T> Validator for JsonBody<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self, req: &Request) -> Result<Value, ApiError> {
        let body: T = req.json()?;
        serde_json::to_value(body).map_err(ApiError::invalid_request_body)
    }
}
