//! Service entry point helpers.
//!
//! ```rust,no_run
//! use clap::Parser;
//! use gantry::app::{self, AppArgs};
//! use gantry::logging::{self, LogConfig};
//! use gantry::Router;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gantry::Error> {
//!     logging::init(&LogConfig::from_env())?;
//!     let args = AppArgs::parse();
//!     app::start(Router::new(), &args).await
//! }
//! ```

use clap::Parser;
use tracing::{debug, info};

use crate::error::Error;
use crate::router::Router;
use crate::server::Server;

/// Command line of a service: `<name> [--port <port>] [--listen]`.
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(version, about = "A gantry service")]
pub struct AppArgs {
    /// Service name, used in logs
    #[arg(env = "SERVICE_NAME", default_value = "server")]
    pub name: String,

    /// Port to listen on
    #[arg(short, long, env = "SERVICE_PORT")]
    pub port: Option<u16>,

    /// Start listening; without it the service only builds its routes
    #[arg(short, long, env = "SERVICE_LISTEN")]
    pub listen: bool,
}

/// Serves `router` on `0.0.0.0:<port>` when a port is given and `listen`
/// is set. Returns right away otherwise.
pub async fn start(router: Router, args: &AppArgs) -> Result<(), Error> {
    let Some(port) = args.port.filter(|_| args.listen) else {
        debug!(name = %args.name, "not listening, no port given or listen unset");
        return Ok(());
    };

    info!("{} service started in port {port}", args.name);
    Server::bind(format!("0.0.0.0:{port}")).serve(router).await
}
