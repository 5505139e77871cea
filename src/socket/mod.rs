//! Real-time broadcasting over WebSockets.
//!
//! A [`Socket`] endpoint accepts WebSocket clients. Clients subscribe by
//! sending a `subscribe-client` frame; for every [`Channel`] whose rules
//! all pass, the client joins the channel room and, when its
//! [`Identifier`] resolves an identity, the personal room
//! `<channel><identity>`. Server code then fans events out through the
//! [`Broadcaster`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gantry::socket::{Broadcaster, Channel, Io, Socket};
//! use gantry::{Router, Server};
//!
//! # async fn run() -> Result<(), gantry::Error> {
//! let broadcaster = Arc::new(Broadcaster::new(vec![Channel::new("orders")]));
//! let socket = Socket::new(Io::new(), Arc::clone(&broadcaster));
//! let router = Router::new().get("/socket", socket.handler());
//!
//! // elsewhere, once an order is placed:
//! broadcaster.broadcast("orders", "created", &serde_json::json!({ "id": 7 }));
//! # Server::bind("0.0.0.0:3000").serve(router).await
//! # }
//! ```

mod broadcaster;
mod channel;
mod io;
pub(crate) mod rule;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::{FutureExt, SinkExt, StreamExt};
use http::StatusCode;
use hyper_util::rt::TokioIo;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tracing::{error, info, warn};

use crate::api_error::ApiError;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::routes::panic_message;

pub use broadcaster::Broadcaster;
pub use channel::{Channel, channel};
pub use io::{Frame, Io, Room};
pub use rule::{Anonymous, HookError, Identifier, Rule};

/// The event a client sends to subscribe to the broadcaster channels.
pub const SUBSCRIBE_EVENT: &str = "subscribe-client";

/// The event sent back once a subscription is processed. Its data lists
/// the rooms the client is in.
pub const SUBSCRIBED_EVENT: &str = "subscribed";

/// The WebSocket endpoint of the application.
pub struct Socket {
    io: Io,
    broadcaster: Arc<Broadcaster>,
}

impl Socket {
    /// Attaches `io` to `broadcaster` and returns the endpoint.
    pub fn new(io: Io, broadcaster: Arc<Broadcaster>) -> Arc<Self> {
        broadcaster.set(io.clone());
        Arc::new(Self { io, broadcaster })
    }

    pub fn io(&self) -> &Io {
        &self.io
    }

    /// The route handler that upgrades requests to WebSocket sessions.
    pub fn handler(self: &Arc<Self>) -> impl Handler {
        let socket = Arc::clone(self);
        move |req: Request| {
            let socket = Arc::clone(&socket);
            async move { socket.upgrade(req).into_response() }
        }
    }

    fn upgrade(self: Arc<Self>, mut req: Request) -> Result<Response, ApiError> {
        let Some(key) = req.header("sec-websocket-key").map(|key| derive_accept_key(key.as_bytes())) else {
            return Err(ApiError::new(StatusCode::BAD_REQUEST, "invalidWebSocketHandshake")
                .detail("Missing sec-websocket-key header"));
        };
        let Some(on_upgrade) = req.take_upgrade() else {
            return Err(ApiError::new(StatusCode::BAD_REQUEST, "invalidWebSocketHandshake")
                .detail("The connection cannot be upgraded"));
        };

        tokio::spawn(async move {
            match on_upgrade.await {
                Ok(upgraded) => {
                    let ws = WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None).await;
                    self.session(ws).await;
                }
                Err(e) => error!("websocket upgrade failed: {e}"),
            }
        });

        Ok(Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .header("connection", "upgrade")
            .header("upgrade", "websocket")
            .header("sec-websocket-accept", &key)
            .no_body())
    }

    async fn session<S>(&self, ws: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (id, mut outbox) = self.io.connect();
        let _registration = Registration { io: &self.io, id: &id };
        info!("Socket {id} has connected to server");

        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                Some(frame) = outbox.recv() => {
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(socket = %id, "dropping unserializable frame: {e}");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.receive(&id, &text).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(socket = %id, "websocket error: {e}");
                        break;
                    }
                },
            }
        }
    }

    async fn receive(&self, id: &str, text: &str) {
        match serde_json::from_str::<Frame>(text) {
            Ok(frame) if frame.event == SUBSCRIBE_EVENT => self.subscribe(id, &frame.data).await,
            Ok(frame) => warn!(socket = %id, event = %frame.event, "ignoring unknown event"),
            Err(e) => warn!(socket = %id, "ignoring malformed frame: {e}"),
        }
    }

    /// Joins `id` to every channel that admits `data`.
    async fn subscribe(&self, id: &str, data: &Value) {
        join_all(self.broadcaster.channels().iter().map(|channel| self.join(id, channel, data))).await;

        let rooms = self.io.rooms_of(id);
        self.io.send(id, Frame::new(SUBSCRIBED_EVENT, json!({ "rooms": rooms })));
    }

    /// Joins `id` to `channel` when its rules admit `data`. A panicking rule
    /// or identifier counts as a rejection.
    async fn join(&self, id: &str, channel: &Channel, data: &Value) {
        let admission = AssertUnwindSafe(async {
            if channel.admits(data).await { Some(channel.resolve_identity(data).await) } else { None }
        })
        .catch_unwind()
        .await;

        let identity = match admission {
            Ok(Some(identity)) => identity,
            Ok(None) => return,
            Err(panic) => {
                warn!(
                    socket = %id,
                    channel = channel.name(),
                    "subscription hook panicked, socket is not joining: {}",
                    panic_message(panic.as_ref())
                );
                return;
            }
        };

        self.io.join(id, channel.name());
        if identity.is_empty() {
            info!("BROADCASTER Socket {id} is joining {} brodcaster channel", channel.name());
        } else {
            let personal = channel.personal(&identity);
            self.io.join(id, &personal);
            info!(
                "BROADCASTER Socket {id} is joining {} brodcaster channel and {personal} personal channel",
                channel.name()
            );
        }
    }
}

/// Removes a socket from the registry when its session ends, however it
/// ends.
struct Registration<'a> {
    io: &'a Io,
    id: &'a str,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.io.leave_all(self.id);
        info!("Socket {} has disconnected from server", self.id);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio_tungstenite::connect_async;

    use super::*;
    use crate::router::Router;
    use crate::testing::spawn_server;

    struct HasToken;

    #[async_trait]
    impl Rule for HasToken {
        async fn predicate(&self, body: &Value) -> Result<bool, HookError> {
            Ok(body["token"] == "secret")
        }
    }

    struct ByUser;

    #[async_trait]
    impl Identifier for ByUser {
        async fn identify(&self, body: &Value) -> String {
            body["user"].as_str().unwrap_or_default().to_owned()
        }
    }

    fn broadcaster() -> Arc<Broadcaster> {
        Arc::new(Broadcaster::new(vec![
            Channel::new("news"),
            Channel::new("orders").rule(HasToken).identifier(ByUser),
        ]))
    }

    async fn next_frame<S>(stream: &mut S) -> Frame
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            if let Message::Text(text) = stream.next().await.unwrap().unwrap() {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    fn subscribe(data: Value) -> Message {
        Message::Text(json!({ "event": SUBSCRIBE_EVENT, "data": data }).to_string())
    }

    #[tokio::test]
    async fn admitted_clients_join_channel_and_personal_rooms() {
        let broadcaster = broadcaster();
        let socket = Socket::new(Io::new(), Arc::clone(&broadcaster));
        let (url, _stop) = spawn_server(Router::new().get("/socket", socket.handler())).await;

        let (mut ws, _) = connect_async(format!("{}/socket", url.replace("http", "ws"))).await.unwrap();
        ws.send(subscribe(json!({ "token": "secret", "user": "7" }))).await.unwrap();

        let ack = next_frame(&mut ws).await;
        assert_eq!(ack, Frame::new(SUBSCRIBED_EVENT, json!({ "rooms": ["news", "orders", "orders7"] })));

        assert!(broadcaster.broadcast("orders", "created", &json!({ "id": 1 })));
        assert_eq!(next_frame(&mut ws).await, Frame::new("created", json!({ "id": 1 })));

        assert!(broadcaster.broadcast_personal("orders", "7", "shipped", &json!({ "id": 1 })));
        assert_eq!(next_frame(&mut ws).await, Frame::new("shipped", json!({ "id": 1 })));
    }

    #[tokio::test]
    async fn failing_rules_keep_clients_out() {
        let broadcaster = broadcaster();
        let socket = Socket::new(Io::new(), Arc::clone(&broadcaster));
        let (url, _stop) = spawn_server(Router::new().get("/socket", socket.handler())).await;

        let (mut ws, _) = connect_async(format!("{}/socket", url.replace("http", "ws"))).await.unwrap();
        ws.send(subscribe(json!({ "token": "guess", "user": "7" }))).await.unwrap();

        let ack = next_frame(&mut ws).await;
        assert_eq!(ack.data, json!({ "rooms": ["news"] }));
    }

    #[tokio::test]
    async fn disconnected_clients_leave_their_rooms() {
        let broadcaster = broadcaster();
        let socket = Socket::new(Io::new(), Arc::clone(&broadcaster));
        let (url, _stop) = spawn_server(Router::new().get("/socket", socket.handler())).await;

        let (mut ws, _) = connect_async(format!("{}/socket", url.replace("http", "ws"))).await.unwrap();
        ws.send(subscribe(json!({}))).await.unwrap();
        next_frame(&mut ws).await;
        ws.close(None).await.unwrap();

        let mut emptied = false;
        for _ in 0..50 {
            if socket.io().to("news").emit("ping", &json!(null)) == 0 {
                emptied = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(emptied);
    }

    struct Explodes;

    #[async_trait]
    impl Rule for Explodes {
        async fn predicate(&self, _body: &Value) -> Result<bool, HookError> {
            panic!("rule exploded");
        }
    }

    #[tokio::test]
    async fn panicking_rules_reject_and_leave_nothing_behind() {
        let broadcaster = Arc::new(Broadcaster::new(vec![
            Channel::new("news"),
            Channel::new("admin").rule(Explodes),
        ]));
        let socket = Socket::new(Io::new(), Arc::clone(&broadcaster));
        let (url, _stop) = spawn_server(Router::new().get("/socket", socket.handler())).await;

        let (mut ws, _) = connect_async(format!("{}/socket", url.replace("http", "ws"))).await.unwrap();
        ws.send(subscribe(json!({}))).await.unwrap();
        assert_eq!(next_frame(&mut ws).await.data, json!({ "rooms": ["news"] }));
        ws.close(None).await.unwrap();

        let mut emptied = false;
        for _ in 0..50 {
            if socket.io().connected() == 0 && socket.io().rooms().is_empty() {
                emptied = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(emptied);
    }

    #[tokio::test]
    async fn plain_requests_are_rejected() {
        let socket = Socket::new(Io::new(), broadcaster());
        let router = Router::new().get("/socket", socket.handler());

        let response = router.call(Request::builder().uri("/socket").build()).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let with_key = Request::builder().uri("/socket").header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==").build();
        assert_eq!(router.call(with_key).await.status_code(), StatusCode::BAD_REQUEST);
    }
}
