// The three scheduled pipelines, each wired to the shared tracker and a reporter.

use std::sync::Arc;

use tracing::info;

use ladder_common::Config;

use crate::notify::Reporter;
use crate::scheduler::{Cadence, Job, Scheduler};
use crate::tracker::Tracker;

pub fn points_job(tracker: Arc<Tracker>, reporter: Arc<dyn Reporter>, cadence: Cadence) -> Job {
    Job::new("update_points", cadence, move || {
        let tracker = Arc::clone(&tracker);
        let reporter = Arc::clone(&reporter);
        async move {
            let deltas = tracker.scoring_cycle().await;
            info!(updates = deltas.len(), "Points cycle complete");
            reporter.scoring(&deltas).await
        }
    })
}

pub fn leaderboard_job(
    tracker: Arc<Tracker>,
    reporter: Arc<dyn Reporter>,
    cadence: Cadence,
) -> Job {
    Job::new("update_leaderboard", cadence, move || {
        let tracker = Arc::clone(&tracker);
        let reporter = Arc::clone(&reporter);
        async move {
            let entries = tracker.leaderboard().await;
            reporter.leaderboard(&entries).await
        }
    })
}

pub fn daily_orders_job(
    tracker: Arc<Tracker>,
    reporter: Arc<dyn Reporter>,
    cadence: Cadence,
) -> Job {
    Job::new("daily_orders", cadence, move || {
        let tracker = Arc::clone(&tracker);
        let reporter = Arc::clone(&reporter);
        async move {
            match tracker.daily_report().await {
                Some(report) => {
                    reporter.daily(&report).await?;
                    info!(owners = report.owners.len(), "Daily orders calculated and sent");
                }
                None => info!("No data available for daily orders calculation"),
            }
            Ok::<(), anyhow::Error>(())
        }
    })
}

/// A scheduler running all three pipelines at their configured cadence.
pub fn build_scheduler(
    config: &Config,
    tracker: Arc<Tracker>,
    reporter: Arc<dyn Reporter>,
) -> Scheduler {
    let mut scheduler = Scheduler::new(config.health_check_interval);
    scheduler.add(points_job(
        Arc::clone(&tracker),
        Arc::clone(&reporter),
        Cadence::Every(config.points_interval),
    ));
    scheduler.add(leaderboard_job(
        Arc::clone(&tracker),
        Arc::clone(&reporter),
        Cadence::Every(config.leaderboard_interval),
    ));
    scheduler.add(daily_orders_job(
        tracker,
        reporter,
        Cadence::DailyAt(config.daily_report_at),
    ));
    scheduler
}
