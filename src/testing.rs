//! Helpers shared by the unit tests that need a live server.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::router::Router;
use crate::server::Server;

/// Serves `router` on an ephemeral local port. Returns the base URL and a
/// sender that stops the server when dropped or fired.
pub(crate) async fn spawn_server(router: Router) -> (String, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let signal = async move {
            let _ = stopped.await;
        };
        Server::from_listener(listener).serve_with_shutdown(router, signal).await.unwrap();
    });

    (format!("http://{addr}"), stop)
}

/// An address nothing listens on.
pub(crate) async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
