//! A users service: REST resource, a gateway to a billing service, a
//! broadcaster channel and a heartbeat schedule.
//!
//! Run with:
//!   cargo run --example basic -- users --port 3000 --listen
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl http://localhost:3000/api/billing/invoices
//!   websocat ws://localhost:3000/socket
//!     {"event":"subscribe-client","data":{"user":"42"}}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use gantry::app::{self, AppArgs};
use gantry::controller::{Controller, HandlerResult, RestController};
use gantry::jsonapi::Extra;
use gantry::logging::{self, LogConfig};
use gantry::middleware::Trace;
use gantry::routes::{Gateway, RestAction, RestValidators, Routes};
use gantry::scheduler::{Frequency, FrequencyParams, Schedule, Scheduler, schedule};
use gantry::service::ServiceClient;
use gantry::socket::{Broadcaster, Channel, Identifier, Io, Socket};
use gantry::validator::JsonBody;
use gantry::{Request, Router};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Deserialize, Serialize)]
struct NewUser {
    name: String,
}

struct Users {
    broadcaster: Arc<Broadcaster>,
}

impl Controller for Users {}

#[async_trait]
impl RestController for Users {
    async fn show(&self, req: Request, _validated: Value) -> HandlerResult {
        let id = req.param("id").unwrap_or_default();
        self.response(StatusCode::OK).data(&json!({ "id": id, "type": "users", "attributes": { "name": "alice" } }))
    }

    async fn store(&self, _req: Request, validated: Value) -> HandlerResult {
        self.broadcaster.broadcast("users", "created", &validated);
        self.response(StatusCode::CREATED).reference("99", "users", Extra::default().meta(validated))
    }
}

struct ByUser;

#[async_trait]
impl Identifier for ByUser {
    async fn identify(&self, body: &Value) -> String {
        body["user"].as_str().unwrap_or_default().to_owned()
    }
}

struct Heartbeat {
    frequency: Frequency,
}

#[async_trait]
impl Schedule for Heartbeat {
    fn name(&self) -> &str { "heartbeat" }
    fn frequency(&self) -> &Frequency { &self.frequency }

    async fn interval_callback(&self) {
        tracing::info!("still alive");
    }
}

#[tokio::main]
async fn main() -> Result<(), gantry::Error> {
    logging::init(&LogConfig::from_env())?;
    let args = AppArgs::parse();

    let broadcaster = Arc::new(Broadcaster::new(vec![Channel::new("users").identifier(ByUser)]));
    let socket = Socket::new(Io::new(), Arc::clone(&broadcaster));

    let users = Routes::new(Users { broadcaster });
    let validators = RestValidators::default().store(JsonBody::<NewUser>::new("New user validator"));
    let billing = ServiceClient::new("billing", "http://localhost:4000");

    let router = Router::new()
        .layer(Arc::new(Trace))
        .get("/socket", socket.handler())
        .nest(
            "/users",
            Router::new().group(vec![], vec![users.rest(validators, &[RestAction::Show, RestAction::Store])]),
        )
        .nest(
            "/api",
            Router::new().group(vec![], vec![Gateway::new().route(vec![billing], &["/invoices"], &[Method::GET])]),
        );

    let heartbeat = Heartbeat {
        frequency: schedule("heartbeat", FrequencyParams::default().interval(Duration::from_secs(30))),
    };
    let scheduler = Scheduler::new(vec![Arc::new(heartbeat)]).start().await?;

    app::start(router, &args).await?;
    scheduler.shutdown().await
}
