// Identity registry: linked player tags, their owners, and running point totals.
//
// `identities` is the single source of truth. `owners` is a cache derived
// from it and is rebuilt on load and after any bulk mutation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use ladder_common::{
    IdentityRecord, LadderError, LeaderboardEntry, OwnerAccounts, OwnerId, OwnerSummary, Tag,
};

/// The persisted form of the registry. The ownership index is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(alias = "player_data", default)]
    pub identities: BTreeMap<Tag, IdentityRecord>,
}

#[derive(Debug, Default)]
pub struct Registry {
    identities: BTreeMap<Tag, IdentityRecord>,
    owners: BTreeMap<OwnerId, BTreeSet<Tag>>,
    /// Mutated since the last successful save.
    unsaved: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from a snapshot. The index is always recomputed.
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        let mut registry = Self {
            identities: snapshot.identities,
            owners: BTreeMap::new(),
            unsaved: false,
        };
        registry.rebuild_index();
        registry
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            identities: self.identities.clone(),
        }
    }

    /// True when in-memory state is ahead of the store.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn mark_saved(&mut self) {
        self.unsaved = false;
    }

    /// Recompute owner → tags from the identity records.
    pub fn rebuild_index(&mut self) {
        self.owners.clear();
        for (tag, record) in &self.identities {
            self.owners
                .entry(record.owner_id.clone())
                .or_default()
                .insert(tag.clone());
        }
    }

    /// Link a raw tag to an owner. The new record starts at zero points.
    pub fn link(
        &mut self,
        raw_tag: &str,
        owner_id: OwnerId,
        display_name: &str,
    ) -> Result<Tag, LadderError> {
        let tag = Tag::parse(raw_tag)?;
        if let Some(existing) = self.identities.get(&tag) {
            return Err(LadderError::AlreadyLinked {
                tag: tag.to_string(),
                owner: existing.owner_id.clone(),
            });
        }

        self.owners
            .entry(owner_id.clone())
            .or_default()
            .insert(tag.clone());
        self.identities
            .insert(tag.clone(), IdentityRecord::new(owner_id.clone(), display_name));
        self.unsaved = true;

        info!(tag = %tag, owner = %owner_id, "Linked player tag");
        Ok(tag)
    }

    /// Remove a tag and prune it from the ownership index.
    pub fn unlink(&mut self, raw_tag: &str) -> Result<IdentityRecord, LadderError> {
        let normalized = Tag::normalize(raw_tag);
        let tag = Tag::parse(raw_tag).map_err(|_| LadderError::NotLinked(normalized.clone()))?;
        let record = self
            .identities
            .remove(&tag)
            .ok_or(LadderError::NotLinked(normalized))?;

        if let Some(tags) = self.owners.get_mut(&record.owner_id) {
            tags.remove(&tag);
            if tags.is_empty() {
                self.owners.remove(&record.owner_id);
            }
        }
        self.unsaved = true;

        info!(tag = %tag, owner = %record.owner_id, points = record.points, "Unlinked player tag");
        Ok(record)
    }

    pub fn get(&self, tag: &Tag) -> Option<&IdentityRecord> {
        self.identities.get(tag)
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.identities.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Add points to a linked tag and return the new total. `None` if not linked.
    pub fn add_points(&mut self, tag: &Tag, delta: u64) -> Option<u64> {
        let record = self.identities.get_mut(tag)?;
        record.points = record.points.saturating_add(delta);
        let total = record.points;
        self.unsaved = true;
        Some(total)
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    fn owner_total(&self, tags: &BTreeSet<Tag>) -> u64 {
        tags.iter()
            .filter_map(|t| self.identities.get(t))
            .map(|r| r.points)
            .sum()
    }

    /// Summed points per owner, in owner order.
    pub fn owner_totals(&self) -> Vec<(OwnerId, u64)> {
        self.owners
            .iter()
            .map(|(owner, tags)| (owner.clone(), self.owner_total(tags)))
            .collect()
    }

    /// Number of linked tags per owner.
    pub fn account_count(&self, owner: &OwnerId) -> usize {
        self.owners.get(owner).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn linked_accounts(&self, owner: &OwnerId) -> OwnerAccounts {
        let accounts: Vec<(Tag, u64)> = self
            .owners
            .get(owner)
            .into_iter()
            .flatten()
            .filter_map(|t| self.identities.get(t).map(|r| (t.clone(), r.points)))
            .collect();
        let total_points = accounts.iter().map(|(_, p)| p).sum();
        OwnerAccounts {
            owner_id: owner.clone(),
            accounts,
            total_points,
        }
    }

    pub fn all_linked_accounts(&self) -> Vec<OwnerSummary> {
        self.owners
            .iter()
            .map(|(owner, tags)| OwnerSummary {
                owner_id: owner.clone(),
                account_count: tags.len(),
                total_points: self.owner_total(tags),
            })
            .collect()
    }

    /// Owners ranked by total points, highest first. Ties break on owner id.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .owners
            .keys()
            .map(|owner| {
                let accounts = self.linked_accounts(owner);
                LeaderboardEntry {
                    owner_id: owner.clone(),
                    total_points: accounts.total_points,
                    account_count: accounts.accounts.len(),
                    accounts: accounts.accounts,
                }
            })
            .collect();
        entries.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a.owner_id.cmp(&b.owner_id))
        });
        entries
    }
}
