//! Infrastructure error type.

use thiserror::Error;

/// The error type returned by gantry's fallible infrastructure operations.
///
/// Application-level failures (404, 422, a downstream service refusing a
/// call) are expressed as [`ApiError`](crate::ApiError) values and rendered
/// as JSONAPI responses. This type surfaces the failures that happen around
/// the request cycle: binding a port, starting the scheduler, installing
/// the log subscriber.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("scheduler: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}
