// Test doubles: canned pages, an in-memory store and a recording reporter.
// No network, no filesystem.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use ladder_common::{AppliedDelta, DailyReport, LadderError, LeaderboardEntry};

use crate::extractor::PageSource;
use crate::notify::Reporter;
use crate::registry::RegistrySnapshot;
use crate::store::RegistryStore;

/// Serves the same page text on every fetch, or fails every fetch.
pub struct MockPageSource {
    page: Option<String>,
    fetches: AtomicUsize,
}

impl MockPageSource {
    pub fn with_page(html: impl Into<String>) -> Self {
        Self {
            page: Some(html.into()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            page: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for MockPageSource {
    async fn fetch_page(&self, url: &str) -> anyhow::Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.page {
            Some(html) => Ok(html.clone()),
            None => anyhow::bail!("HTTP error (status 503) fetching {url}"),
        }
    }
}

/// Keeps the last saved snapshot in memory and counts saves.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<RegistrySnapshot>>,
    saves: AtomicUsize,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// A store whose every save fails.
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> Option<RegistrySnapshot> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn load(&self) -> RegistrySnapshot {
        self.saved().unwrap_or_default()
    }

    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), LadderError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves {
            return Err(LadderError::Persistence(std::io::Error::other("disk full")));
        }
        if let Ok(mut slot) = self.snapshot.lock() {
            *slot = Some(snapshot.clone());
        }
        Ok(())
    }
}

/// Records everything it is asked to report.
#[derive(Default)]
pub struct RecordingReporter {
    pub scoring: Mutex<Vec<Vec<AppliedDelta>>>,
    pub leaderboards: Mutex<Vec<Vec<LeaderboardEntry>>>,
    pub daily: Mutex<Vec<DailyReport>>,
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn scoring(&self, deltas: &[AppliedDelta]) -> anyhow::Result<()> {
        self.scoring
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push(deltas.to_vec());
        Ok(())
    }

    async fn leaderboard(&self, entries: &[LeaderboardEntry]) -> anyhow::Result<()> {
        self.leaderboards
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push(entries.to_vec());
        Ok(())
    }

    async fn daily(&self, report: &DailyReport) -> anyhow::Result<()> {
        self.daily
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push(report.clone());
        Ok(())
    }
}
