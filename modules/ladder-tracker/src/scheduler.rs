// Periodic jobs plus a liveness monitor that restarts any job loop found stopped.
//
// Each cycle runs in its own task: an error or panic in one cycle is logged
// and the job waits for its next tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Shortest period a job may run at.
const MIN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Run at start, then every period.
    Every(Duration),
    /// Run once a day at this UTC time.
    DailyAt(NaiveTime),
}

type CycleFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

pub struct Job {
    name: &'static str,
    cadence: Cadence,
    cycle: CycleFn,
}

impl Job {
    pub fn new<F, Fut>(name: &'static str, cadence: Cadence, cycle: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name,
            cadence,
            cycle: Arc::new(move || cycle().boxed()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run one cycle in isolation. Never propagates failure to the job loop.
    async fn run_cycle(&self) {
        debug!(job = self.name, "Cycle starting");
        match tokio::spawn((self.cycle)()).await {
            Ok(Ok(())) => debug!(job = self.name, "Cycle complete"),
            Ok(Err(e)) => warn!(job = self.name, error = %e, "Cycle failed"),
            Err(e) if e.is_panic() => error!(job = self.name, "Cycle panicked"),
            Err(e) => warn!(job = self.name, error = %e, "Cycle cancelled"),
        }
    }

    async fn run_forever(self: Arc<Self>) {
        match self.cadence {
            Cadence::Every(period) => {
                let mut ticker = tokio::time::interval(period.max(MIN_PERIOD));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    self.run_cycle().await;
                }
            }
            Cadence::DailyAt(at) => loop {
                let now = Utc::now();
                let next = next_daily_run(now, at);
                info!(job = self.name, next = %next.format("%Y-%m-%dT%H:%M:%SZ"), "Daily job scheduled");
                tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;
                self.run_cycle().await;
            },
        }
    }
}

/// The next time `at` (UTC) occurs strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

pub struct Scheduler {
    jobs: Vec<Arc<Job>>,
    handles: Vec<Option<JoinHandle<()>>>,
    health_interval: Duration,
}

impl Scheduler {
    pub fn new(health_interval: Duration) -> Self {
        Self {
            jobs: Vec::new(),
            handles: Vec::new(),
            health_interval: health_interval.max(MIN_PERIOD),
        }
    }

    pub fn add(&mut self, job: Job) {
        self.jobs.push(Arc::new(job));
        self.handles.push(None);
    }

    /// Spawn every job that is not currently running.
    pub fn start(&mut self) {
        for (job, handle) in self.jobs.iter().zip(self.handles.iter_mut()) {
            if handle.is_none() {
                info!(job = job.name(), cadence = ?job.cadence, "Starting job");
                *handle = Some(tokio::spawn(Arc::clone(job).run_forever()));
            }
        }
    }

    /// Respawn any job whose loop has ended. Returns how many were restarted.
    pub fn restart_stopped(&mut self) -> usize {
        let mut restarted = 0;
        for (job, handle) in self.jobs.iter().zip(self.handles.iter_mut()) {
            let stopped = handle.as_ref().map_or(true, JoinHandle::is_finished);
            if stopped {
                error!(job = job.name(), "Job stopped! Restarting...");
                *handle = Some(tokio::spawn(Arc::clone(job).run_forever()));
                restarted += 1;
            }
        }
        restarted
    }

    /// Start all jobs and keep them alive. Runs until the task is dropped.
    pub async fn supervise(&mut self) {
        self.start();

        let mut ticker = tokio::time::interval(self.health_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let restarted = self.restart_stopped();
            debug!(jobs = self.jobs.len(), restarted, "Health check complete");
        }
    }

    /// Abort every job loop.
    pub fn shutdown(&mut self) {
        for (job, handle) in self.jobs.iter().zip(self.handles.iter_mut()) {
            if let Some(h) = handle.take() {
                h.abort();
                info!(job = job.name(), "Job stopped");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
