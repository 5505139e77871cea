//! # gantry
//!
//! A micro-framework for JSONAPI microservices on hyper.
//!
//! A service built on gantry speaks one error convention and one response
//! shape. Handlers return `Result<Response, ApiError>`; every failure that
//! reaches the router, including a panic, leaves the service as a JSONAPI
//! error document `{"errors": [..]}` with the error's status.
//!
//! What a service gets:
//!
//! - Radix-tree routing via [`matchit`], per-route middleware chains,
//!   graceful shutdown ([`Router`], [`Server`], [`middleware`])
//! - Controllers, validators and transforms wired into a method pipeline:
//!   validate, run the action, report ([`controller`], [`validator`],
//!   [`transform`], [`routes`])
//! - REST resources and a reverse-proxy gateway to other services
//!   ([`routes::Routes::rest`], [`routes::Gateway`], [`service`])
//! - JSONAPI documents for data, pagination, metadata and references
//!   ([`jsonapi`])
//! - A sea-orm backed repository ([`repository`])
//! - Timeouts, intervals and cron jobs on one trait ([`scheduler`])
//! - A WebSocket broadcaster with rule-guarded channels ([`socket`])
//! - Bearer JWT decoding and per-user verification ([`jwt`])
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use clap::Parser;
//! use gantry::app::{self, AppArgs};
//! use gantry::controller::{Controller, HandlerResult, RestController};
//! use gantry::logging::{self, LogConfig};
//! use gantry::middleware::Trace;
//! use gantry::routes::{RestAction, RestValidators, Routes};
//! use gantry::{Request, Router};
//! use http::StatusCode;
//! use serde_json::{Value, json};
//!
//! struct Users;
//!
//! impl Controller for Users {}
//!
//! #[async_trait::async_trait]
//! impl RestController for Users {
//!     async fn show(&self, req: Request, _validated: Value) -> HandlerResult {
//!         self.response(StatusCode::OK).data(&json!({ "id": req.param("id") }))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gantry::Error> {
//!     logging::init(&LogConfig::from_env())?;
//!
//!     let users = Routes::new(Users);
//!     let router = Router::new().nest(
//!         "/users",
//!         Router::new().group(vec![Arc::new(Trace)], vec![
//!             users.rest(RestValidators::default(), &[RestAction::Show]),
//!         ]),
//!     );
//!
//!     app::start(router, &AppArgs::parse()).await
//! }
//! ```

mod api_error;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod app;
pub mod controller;
pub mod jsonapi;
pub mod jwt;
pub mod logging;
pub mod middleware;
pub mod repository;
pub mod routes;
pub mod scheduler;
pub mod service;
pub mod socket;
pub mod time;
pub mod transform;
pub mod validator;

#[cfg(test)]
mod testing;

pub use api_error::{ApiError, catcher, throw};
pub use error::Error;
pub use handler::Handler;
pub use request::{Request, RequestBuilder};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
