use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info};

use ladder_common::{
    AppliedDelta, DailyReport, IdentityRecord, LadderError, LeaderboardEntry, OwnerAccounts,
    OwnerId, OwnerSummary, Tag,
};

use crate::extractor::PageExtractor;
use crate::matcher::match_top_ranks;
use crate::registry::Registry;
use crate::report::build_daily_report;
use crate::scoring::apply_updates;
use crate::store::{load_registry, save_registry, RegistryStore, StoreLock};

/// Owns the shared registry and runs the pipeline against it.
///
/// Every mutation (scoring and admin link/unlink) goes through the one
/// registry mutex, so point additions never interleave. Other processes on
/// the same store are seen by reloading before each access; writers also
/// hold the store lock from reload to save.
pub struct Tracker {
    registry: Mutex<Registry>,
    store: Arc<dyn RegistryStore>,
    extractor: PageExtractor,
}

impl Tracker {
    /// A tracker that reads its registry from the store on first use.
    pub fn new(store: Arc<dyn RegistryStore>, extractor: PageExtractor) -> Self {
        Self::with_registry(Registry::new(), store, extractor)
    }

    /// Build a tracker from whatever the store currently holds.
    pub async fn load(store: Arc<dyn RegistryStore>, extractor: PageExtractor) -> Self {
        let registry = load_registry(store.as_ref()).await;
        Self::with_registry(registry, store, extractor)
    }

    fn with_registry(
        registry: Registry,
        store: Arc<dyn RegistryStore>,
        extractor: PageExtractor,
    ) -> Self {
        Self {
            registry: Mutex::new(registry),
            store,
            extractor,
        }
    }

    /// Replace the registry with the stored copy, unless it holds changes the
    /// store has not accepted yet.
    async fn refresh(&self, registry: &mut Registry) {
        if !registry.has_unsaved_changes() {
            *registry = Registry::from_snapshot(self.store.load().await);
        }
    }

    async fn current(&self) -> MutexGuard<'_, Registry> {
        let mut registry = self.registry.lock().await;
        self.refresh(&mut registry).await;
        registry
    }

    /// The refreshed registry plus the store lock, for a load-mutate-save section.
    /// Always taken in this order: registry mutex, then store lock.
    async fn writable(&self) -> Result<(MutexGuard<'_, Registry>, StoreLock), LadderError> {
        let mut registry = self.registry.lock().await;
        let lock = self.store.lock().await?;
        self.refresh(&mut registry).await;
        Ok((registry, lock))
    }

    /// One scoring cycle: scrape, match against linked tags, award points.
    ///
    /// An empty result means nothing scored this cycle, not a failure.
    pub async fn scoring_cycle(&self) -> Vec<AppliedDelta> {
        let records = self.extractor.fetch_and_extract().await;
        if records.is_empty() {
            return Vec::new();
        }

        let (mut registry, _lock) = match self.writable().await {
            Ok(section) => section,
            Err(e) => {
                error!(error = %e, "Could not lock player data, scoring in memory only");
                (self.registry.lock().await, StoreLock::in_process())
            }
        };
        let matches = match_top_ranks(&records, &registry);
        if matches.is_empty() {
            info!("No linked players found in top ranks");
            return Vec::new();
        }

        apply_updates(&matches, &mut registry, self.store.as_ref()).await
    }

    /// Link a tag and save. A failed save is returned; the link stays in memory.
    pub async fn link(
        &self,
        raw_tag: &str,
        owner_id: OwnerId,
        display_name: &str,
    ) -> Result<Tag, LadderError> {
        let (mut registry, _lock) = self.writable().await?;
        let tag = registry.link(raw_tag, owner_id, display_name)?;
        save_registry(self.store.as_ref(), &mut registry).await?;
        Ok(tag)
    }

    /// Unlink a tag and save. A failed save is returned; the unlink stays in memory.
    pub async fn unlink(&self, raw_tag: &str) -> Result<IdentityRecord, LadderError> {
        let (mut registry, _lock) = self.writable().await?;
        let record = registry.unlink(raw_tag)?;
        save_registry(self.store.as_ref(), &mut registry).await?;
        Ok(record)
    }

    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.current().await.leaderboard()
    }

    pub async fn daily_report(&self) -> Option<DailyReport> {
        build_daily_report(&*self.current().await)
    }

    pub async fn linked_accounts(&self, owner: &OwnerId) -> OwnerAccounts {
        self.current().await.linked_accounts(owner)
    }

    pub async fn all_linked_accounts(&self) -> Vec<OwnerSummary> {
        self.current().await.all_linked_accounts()
    }

    /// Points currently held by a tag, if linked.
    pub async fn points(&self, tag: &Tag) -> Option<u64> {
        self.current().await.get(tag).map(|r| r.points)
    }
}
