//! Bearer JWT authentication.
//!
//! Authentication runs in two steps. [`decode_bearer_scheme`] reads the
//! token out of an `Authorization` value and decodes its claims without
//! checking the signature. [`verify_user_token`] then reads the user
//! identifier from the claims, asks a [`SecretSource`] for that user's
//! secret and verifies the token against it.
//!
//! Both steps fail with a [`JwtError`]. Inside a handler use
//! [`authorization`] and [`authenticate`], which read the request header
//! and fail with the matching [`ApiError`].
//!
//! ```rust,ignore
//! async fn show(&self, req: Request, _validated: Value) -> HandlerResult {
//!     let user = jwt::authenticate(&req, &self.secrets, &IndexOptions::default()).await?;
//!     ...
//! }
//! ```

use std::collections::HashSet;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::api_error::ApiError;
use crate::request::Request;

/// A decoded bearer token.
#[derive(Clone, Debug, PartialEq)]
pub struct Bearer {
    /// The token's claims.
    pub decoded: Value,
    pub token: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Missing authorization.")]
    MissingAuthorization,

    #[error("Wrong auth scheme, expected Bearer. given: {0}")]
    WrongScheme(String),

    #[error("Missing JWT.")]
    MissingToken,

    #[error("Bad JWT.")]
    BadToken { token: String },

    #[error("Bad JWT. Indexing property '{property}' found invalid")]
    BadIdentifier { property: String, token: String },

    #[error("Given JWT was invalid or has expired")]
    Invalid { token: String },
}

impl From<JwtError> for ApiError {
    fn from(error: JwtError) -> Self {
        match &error {
            JwtError::MissingAuthorization | JwtError::WrongScheme(_) => ApiError::unauthorized(error.to_string()),
            JwtError::MissingToken => ApiError::missing_jwt(),
            JwtError::BadToken { token } | JwtError::BadIdentifier { token, .. } => ApiError::bad_jwt(token),
            JwtError::Invalid { token } => ApiError::invalid_jwt(token),
        }
    }
}

/// Looks up the secret a user's tokens are signed with.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// `None` when the user has no valid secret.
    async fn secret(&self, id: &Value) -> Option<String>;
}

/// Where the user identifier lives in the claims and which identifiers are
/// refused.
#[derive(Clone, Debug)]
pub struct IndexOptions {
    pub property: String,
    pub reject: fn(&Value) -> bool,
}

impl Default for IndexOptions {
    /// The `user` claim, refused unless it is numeric.
    fn default() -> Self {
        Self { property: "user".to_owned(), reject: not_a_number }
    }
}

/// `true` unless `id` is a number or a string holding one.
pub fn not_a_number(id: &Value) -> bool {
    match id {
        Value::Number(_) => false,
        Value::String(s) => s.trim().parse::<f64>().is_err(),
        _ => true,
    }
}

/// Splits `Bearer <token>` and decodes the token's claims. The signature is
/// not checked.
pub fn decode_bearer_scheme(authorization: &str) -> Result<Bearer, JwtError> {
    let mut parts = authorization.trim().split(' ');
    let scheme = parts.next().unwrap_or_default();
    if scheme != "Bearer" {
        return Err(JwtError::WrongScheme(scheme.to_owned()));
    }

    let token = parts.next().filter(|token| !token.is_empty()).ok_or(JwtError::MissingToken)?;
    let decoded = jsonwebtoken::decode::<Value>(token, &DecodingKey::from_secret(&[]), &unverified())
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "bearer token could not be decoded");
            JwtError::BadToken { token: token.to_owned() }
        })?;

    Ok(Bearer { decoded, token: token.to_owned() })
}

/// Reads the user identifier out of the claims.
pub fn validate_user_identifier(bearer: &Bearer, options: &IndexOptions) -> Result<Value, JwtError> {
    let id = bearer.decoded.get(&options.property).cloned().unwrap_or(Value::Null);
    if (options.reject)(&id) {
        return Err(JwtError::BadIdentifier { property: options.property.clone(), token: bearer.token.clone() });
    }
    Ok(id)
}

/// Verifies the token against the secret `source` holds for its user and
/// returns the user identifier. An `exp` claim in the past fails
/// verification.
pub async fn verify_user_token(
    bearer: &Bearer,
    source: &dyn SecretSource,
    options: &IndexOptions,
) -> Result<Value, JwtError> {
    let id = validate_user_identifier(bearer, options)?;
    let invalid = || JwtError::Invalid { token: bearer.token.clone() };

    let secret = source.secret(&id).await.ok_or_else(invalid)?;
    jsonwebtoken::decode::<Value>(&bearer.token, &DecodingKey::from_secret(secret.as_bytes()), &verified())
        .map_err(|_| invalid())?;

    Ok(id)
}

/// Decodes the request's `Authorization` header.
pub fn authorization(req: &Request) -> Result<Bearer, ApiError> {
    let header = req.header("authorization").ok_or(JwtError::MissingAuthorization)?;
    Ok(decode_bearer_scheme(header)?)
}

/// Decodes and verifies the request's bearer token, returning the user
/// identifier.
pub async fn authenticate(req: &Request, source: &dyn SecretSource, options: &IndexOptions) -> Result<Value, ApiError> {
    let bearer = authorization(req)?;
    Ok(verify_user_token(&bearer, source, options).await?)
}

fn unverified() -> Validation {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();
    validation
}

fn verified() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();
    validation.leeway = 0;
    validation
}
