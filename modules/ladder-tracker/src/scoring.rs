// Scoring engine: rank → points, applying awards, and point-share percentages.

use std::collections::BTreeMap;

use tracing::{info, warn};

use ladder_common::{AppliedDelta, OwnerId, RankMatch};

use crate::registry::Registry;
use crate::store::{persist, RegistryStore};

/// Points awarded per hourly placement. Ranks outside the table score nothing.
pub const POINT_TABLE: [(i64, u64); 8] = [
    (1, 20),
    (2, 14),
    (3, 12),
    (4, 10),
    (5, 8),
    (6, 6),
    (7, 4),
    (8, 2),
];

pub fn points_for_rank(rank: i64) -> u64 {
    POINT_TABLE
        .iter()
        .find(|(r, _)| *r == rank)
        .map(|(_, points)| *points)
        .unwrap_or(0)
}

/// Award points for each match and persist once if anything changed.
///
/// A match with an uncoercible rank is skipped without affecting the rest.
/// Ranks worth zero points are silently skipped.
pub async fn apply_updates(
    matches: &[RankMatch],
    registry: &mut Registry,
    store: &dyn RegistryStore,
) -> Vec<AppliedDelta> {
    let mut applied = Vec::new();

    for m in matches {
        let Some(rank) = m.rank.coerce() else {
            warn!(tag = %m.tag, rank = %m.rank, "Could not convert rank to integer");
            continue;
        };

        let delta = points_for_rank(rank);
        if delta == 0 {
            continue;
        }

        let Some(new_total) = registry.add_points(&m.tag, delta) else {
            warn!(tag = %m.tag, "Matched tag is no longer linked");
            continue;
        };

        info!(tag = %m.tag, name = %m.name, rank, delta, new_total, "Added points");
        applied.push(AppliedDelta {
            tag: m.tag.clone(),
            name: m.name.clone(),
            rank,
            delta,
            new_total,
        });
    }

    if !applied.is_empty() {
        persist(store, registry).await;
    }

    applied
}

/// Round half away from zero to one decimal place.
pub fn round_1dp(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Each owner's share of all points, as a percentage rounded to one decimal.
/// Empty when nobody has any points.
pub fn order_percentages(owner_totals: &[(OwnerId, u64)]) -> BTreeMap<OwnerId, f64> {
    let total: u64 = owner_totals.iter().map(|(_, p)| p).sum();
    if total == 0 {
        return BTreeMap::new();
    }

    owner_totals
        .iter()
        .map(|(owner, points)| {
            let share = *points as f64 / total as f64 * 100.0;
            (owner.clone(), round_1dp(share))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use ladder_common::{RawRank, Tag};

    #[test]
    fn table_values() {
        let expected = [20, 14, 12, 10, 8, 6, 4, 2];
        for (i, points) in expected.iter().enumerate() {
            assert_eq!(points_for_rank(i as i64 + 1), *points);
        }
        for rank in [i64::MIN, -1, 0, 9, 100, i64::MAX] {
            assert_eq!(points_for_rank(rank), 0);
        }
    }

    #[test]
    fn percentages_round_to_one_decimal() {
        let totals = vec![
            (OwnerId::from("A"), 1),
            (OwnerId::from("B"), 1),
            (OwnerId::from("C"), 1),
        ];
        let pct = order_percentages(&totals);
        assert_eq!(pct[&OwnerId::from("A")], 33.3);
        assert_eq!(pct.len(), 3);
    }

    #[test]
    fn zero_point_owner_is_kept_at_zero() {
        let totals = vec![(OwnerId::from("A"), 100), (OwnerId::from("B"), 0)];
        let pct = order_percentages(&totals);
        assert_eq!(pct[&OwnerId::from("A")], 100.0);
        assert_eq!(pct[&OwnerId::from("B")], 0.0);
    }

    #[test]
    fn zero_total_yields_nothing() {
        let totals = vec![(OwnerId::from("A"), 0)];
        assert!(order_percentages(&totals).is_empty());
        assert!(order_percentages(&[]).is_empty());
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_1dp(12.25), 12.3);
        assert_eq!(round_1dp(66.66666), 66.7);
        assert_eq!(round_1dp(0.04), 0.0);
    }

    fn matched(tag: &str, rank: RawRank) -> RankMatch {
        RankMatch {
            tag: Tag::parse(tag).unwrap(),
            name: "X".to_string(),
            rank,
        }
    }

    #[tokio::test]
    async fn bad_rank_does_not_block_batch() {
        let store = MemoryStore::default();
        let mut reg = Registry::new();
        reg.link("2PY", OwnerId::from("U1"), "a").unwrap();
        reg.link("8QG", OwnerId::from("U1"), "b").unwrap();

        let matches = vec![
            matched("2PY", RawRank::Text("first".into())),
            matched("8QG", RawRank::Text("3".into())),
        ];
        let applied = apply_updates(&matches, &mut reg, &store).await;

        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].delta, 12);
        assert_eq!(applied[0].new_total, 12);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn no_delta_means_no_write() {
        let store = MemoryStore::default();
        let mut reg = Registry::new();
        reg.link("2PY", OwnerId::from("U1"), "a").unwrap();

        let matches = vec![matched("2PY", RawRank::Missing), matched("2PY", RawRank::Int(11))];
        let applied = apply_updates(&matches, &mut reg, &store).await;

        assert!(applied.is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn owner_totals_track_linked_tags() {
        let store = MemoryStore::default();
        let mut reg = Registry::new();
        reg.link("2PY", OwnerId::from("U1"), "a").unwrap();
        reg.link("8QG", OwnerId::from("U1"), "b").unwrap();
        reg.link("9RJ", OwnerId::from("U2"), "c").unwrap();

        let matches = vec![
            matched("9RJ", RawRank::Int(1)),
            matched("2PY", RawRank::Int(2)),
            matched("8QG", RawRank::Int(8)),
        ];
        apply_updates(&matches, &mut reg, &store).await;

        for (owner, total) in reg.owner_totals() {
            let expected: u64 = reg
                .linked_accounts(&owner)
                .accounts
                .iter()
                .map(|(tag, _)| reg.get(tag).unwrap().points)
                .sum();
            assert_eq!(total, expected);
        }
        let totals: BTreeMap<_, _> = reg.owner_totals().into_iter().collect();
        assert_eq!(totals[&OwnerId::from("U1")], 16);
        assert_eq!(totals[&OwnerId::from("U2")], 20);
        assert_eq!(store.save_count(), 1);
    }
}
