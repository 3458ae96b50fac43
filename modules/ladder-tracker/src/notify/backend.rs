use async_trait::async_trait;

use ladder_common::{AppliedDelta, DailyReport, LeaderboardEntry};

/// Pluggable output for cycle results. Rendering and delivery live behind this.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Points applied by one scoring cycle. May be empty.
    async fn scoring(&self, deltas: &[AppliedDelta]) -> anyhow::Result<()>;

    /// Current owner standings, highest first.
    async fn leaderboard(&self, entries: &[LeaderboardEntry]) -> anyhow::Result<()>;

    /// The daily order allocation.
    async fn daily(&self, report: &DailyReport) -> anyhow::Result<()>;
}
