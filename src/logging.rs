//! Log subscriber setup.
//!
//! Every log line is prefixed with the service name and the UTC time, so
//! the output of several services can be interleaved and still read:
//!
//! ```text
//! [users] 2024-05-01T10:00:00  INFO users service started in port 3000
//! ```

use std::fmt;

use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, filter_fn};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::Error;
use crate::time;

/// Which levels are logged and under which service name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    pub name: String,
    pub debug: bool,
    pub info: bool,
    pub error: bool,
    /// Nothing is logged when `true`.
    pub silent: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { name: "server".to_owned(), debug: true, info: true, error: true, silent: false }
    }
}

impl LogConfig {
    /// Reads `SERVICE_NAME`, `LOG_DEBUG`, `LOG_INFO`, `LOG_ERROR` and
    /// `APP_ENV`. Unset toggles stay on; `APP_ENV=test` silences logging.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let toggle = |key: &str, default: bool| lookup(key).map_or(default, |value| flag(&value));

        Self {
            name: lookup("SERVICE_NAME").filter(|name| !name.is_empty()).unwrap_or(defaults.name),
            debug: toggle("LOG_DEBUG", defaults.debug),
            info: toggle("LOG_INFO", defaults.info),
            error: toggle("LOG_ERROR", defaults.error),
            silent: lookup("APP_ENV").is_some_and(|env| env == "test"),
        }
    }

    /// Whether events of `level` are logged. `LOG_ERROR` covers errors and
    /// warnings, `LOG_DEBUG` covers debug and trace events.
    pub fn enables(&self, level: &Level) -> bool {
        if self.silent {
            return false;
        }
        match *level {
            Level::ERROR | Level::WARN => self.error,
            Level::INFO => self.info,
            Level::DEBUG | Level::TRACE => self.debug,
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

struct ServiceClock {
    name: String,
}

impl FormatTime for ServiceClock {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "[{}] {}", self.name, time::datetime())
    }
}

/// Installs the global subscriber. `RUST_LOG` narrows what is logged
/// (`debug` when unset); the level toggles of `config` then apply on top.
pub fn init(config: &LogConfig) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let levels = config.clone();

    let output = tracing_subscriber::fmt::layer()
        .with_timer(ServiceClock { name: config.name.clone() })
        .with_filter(filter_fn(move |metadata| levels.enables(metadata.level())));

    tracing_subscriber::registry().with(filter).with(output).try_init()?;
    Ok(())
}
