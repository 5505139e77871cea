use std::time::Duration;

use async_trait::async_trait;
use tokio_cron_scheduler::Job;
use tracing::error;

/// The frequency parameters a schedule is declared with. Any combination
/// may be set; empty strings and zero durations count as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrequencyParams {
    /// A cron expression, seconds field first.
    pub cron: Option<String>,
    /// Run once, this long after the scheduler starts.
    pub timeout: Option<Duration>,
    /// Run repeatedly with this period.
    pub interval: Option<Duration>,
}

impl FrequencyParams {
    pub fn cron(mut self, expr: impl Into<String>) -> Self {
        self.cron = Some(expr.into());
        self
    }

    pub fn timeout(mut self, after: Duration) -> Self {
        self.timeout = Some(after);
        self
    }

    pub fn interval(mut self, every: Duration) -> Self {
        self.interval = Some(every);
        self
    }
}

/// A validated frequency. Built with [`schedule`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frequency {
    cron: Option<String>,
    timeout: Option<Duration>,
    interval: Option<Duration>,
}

impl Frequency {
    pub fn cron(&self) -> Option<&str> { self.cron.as_deref() }
    pub fn timeout(&self) -> Option<Duration> { self.timeout }
    pub fn interval(&self) -> Option<Duration> { self.interval }
}

/// Validates the frequency of the schedule called `name`.
///
/// An invalid cron expression is logged and dropped; the rest of the
/// frequency is kept.
pub fn schedule(name: &str, params: FrequencyParams) -> Frequency {
    let cron = params
        .cron
        .map(|expr| expr.trim().to_owned())
        .filter(|expr| !expr.is_empty())
        .filter(|expr| {
            let valid = Job::new_async(expr.as_str(), |_, _| Box::pin(async {})).is_ok();
            if !valid {
                error!("Found invalid cron value for {name}, cronjob will never be executed");
            }
            valid
        });

    Frequency {
        cron,
        timeout: params.timeout.filter(|d| !d.is_zero()),
        interval: params.interval.filter(|d| !d.is_zero()),
    }
}

/// A unit of scheduled work.
///
/// ```rust
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use gantry::scheduler::{Frequency, FrequencyParams, Schedule, schedule};
///
/// struct PurgeSessions {
///     frequency: Frequency,
/// }
///
/// impl PurgeSessions {
///     fn new() -> Self {
///         let params = FrequencyParams::default().cron("0 0 3 * * *").timeout(Duration::from_secs(5));
///         Self { frequency: schedule("purge sessions", params) }
///     }
/// }
///
/// #[async_trait]
/// impl Schedule for PurgeSessions {
///     fn name(&self) -> &str { "purge sessions" }
///     fn frequency(&self) -> &Frequency { &self.frequency }
///
///     async fn cron_callback(&self) {
///         // delete expired rows
///     }
/// }
/// ```
#[async_trait]
pub trait Schedule: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn frequency(&self) -> &Frequency;

    async fn cron_callback(&self) {}

    async fn interval_callback(&self) {}

    async fn timeout_callback(&self) {}
}
