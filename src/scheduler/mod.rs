//! Scheduled work: one-shot timeouts, repeating intervals and cron jobs
//! multiplexed onto [`Schedule`] callbacks.
//!
//! ```rust,ignore
//! let handle = Scheduler::new(vec![Arc::new(PurgeSessions::new())]).start().await?;
//! // ...
//! handle.shutdown().await?;
//! ```

mod schedule;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::error::Error;
use crate::routes::panic_message;

pub use schedule::{Frequency, FrequencyParams, Schedule, schedule};

#[derive(Clone, Copy)]
enum Kind {
    Timeout,
    Interval,
    Cron,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Timeout => "timeout",
            Kind::Interval => "interval",
            Kind::Cron => "cronjob",
        }
    }
}

/// Runs one callback. A panicking callback is logged and does not stop
/// later runs of the schedule.
async fn execute(schedule: &dyn Schedule, kind: Kind) {
    info!("SCHEDULER Executing {} scheduled {} callback", schedule.name(), kind.as_str());
    let callback = match kind {
        Kind::Timeout => schedule.timeout_callback(),
        Kind::Interval => schedule.interval_callback(),
        Kind::Cron => schedule.cron_callback(),
    };
    if let Err(panic) = AssertUnwindSafe(callback).catch_unwind().await {
        error!(
            "SCHEDULER {} scheduled {} callback panicked: {}",
            schedule.name(),
            kind.as_str(),
            panic_message(panic.as_ref())
        );
    }
}

/// The application scheduler.
pub struct Scheduler {
    schedules: Vec<Arc<dyn Schedule>>,
}

impl Scheduler {
    pub fn new(schedules: Vec<Arc<dyn Schedule>>) -> Self {
        Self { schedules }
    }

    /// Registers the timeout, interval and cron job of every schedule and
    /// starts running them.
    ///
    /// # Errors
    ///
    /// When the cron job scheduler cannot be created or started.
    pub async fn start(self) -> Result<SchedulerHandle, Error> {
        let mut cron = JobScheduler::new().await?;
        let mut tasks = Vec::new();

        for schedule in self.schedules {
            let frequency = schedule.frequency().clone();

            if let Some(after) = frequency.timeout() {
                let schedule = Arc::clone(&schedule);
                tasks.push(tokio::spawn(async move {
                    time::sleep(after).await;
                    execute(schedule.as_ref(), Kind::Timeout).await;
                }));
            }

            if let Some(every) = frequency.interval() {
                let schedule = Arc::clone(&schedule);
                tasks.push(tokio::spawn(async move {
                    let mut ticker = time::interval_at(Instant::now() + every, every);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        execute(schedule.as_ref(), Kind::Interval).await;
                    }
                }));
            }

            if let Some(expr) = frequency.cron() {
                let schedule = Arc::clone(&schedule);
                let job = Job::new_async(expr, move |_uuid, _lock| {
                    let schedule = Arc::clone(&schedule);
                    Box::pin(async move { execute(schedule.as_ref(), Kind::Cron).await })
                })?;
                cron.add(job).await?;
            }
        }

        cron.start().await?;
        info!(tasks = tasks.len(), "scheduler started");

        Ok(SchedulerHandle { cron, tasks })
    }
}

/// Controls a started [`Scheduler`].
pub struct SchedulerHandle {
    cron: JobScheduler,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Cancels pending timeouts and intervals and stops the cron jobs.
    pub async fn shutdown(mut self) -> Result<(), Error> {
        for task in &self.tasks {
            task.abort();
        }
        self.cron.shutdown().await?;
        info!("scheduler stopped");
        Ok(())
    }
}
