use async_trait::async_trait;
use tracing::info;

use ladder_common::{AppliedDelta, DailyReport, LeaderboardEntry};

use super::backend::Reporter;
use super::render;

/// Renders reports into the log. Used when no webhook is configured.
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    async fn scoring(&self, deltas: &[AppliedDelta]) -> anyhow::Result<()> {
        info!("{}", render::scoring(deltas));
        Ok(())
    }

    async fn leaderboard(&self, entries: &[LeaderboardEntry]) -> anyhow::Result<()> {
        info!("{}", render::leaderboard(entries));
        Ok(())
    }

    async fn daily(&self, report: &DailyReport) -> anyhow::Result<()> {
        info!("{}", render::daily(report));
        Ok(())
    }
}
