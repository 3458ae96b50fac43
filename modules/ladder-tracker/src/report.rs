// Daily allocation report. The 70% share is reporting policy layered on the
// raw percentages from the scoring engine, never recomputed from points.

use ladder_common::{DailyReport, OwnerAllocation};

use crate::registry::Registry;
use crate::scoring::{order_percentages, round_1dp};

/// Fraction of the day's orders reserved for leaderboard pushers.
pub const PUSHER_ORDER_SHARE: f64 = 0.70;

/// Build the daily report. `None` when no owner has any linked account.
pub fn build_daily_report(registry: &Registry) -> Option<DailyReport> {
    let owner_totals = registry.owner_totals();
    if owner_totals.is_empty() {
        return None;
    }

    let percentages = order_percentages(&owner_totals);

    let mut owners: Vec<OwnerAllocation> = owner_totals
        .iter()
        .filter_map(|(owner, total_points)| {
            let raw_percentage = *percentages.get(owner)?;
            Some(OwnerAllocation {
                owner_id: owner.clone(),
                total_points: *total_points,
                account_count: registry.account_count(owner),
                raw_percentage,
                allocated_percentage: round_1dp(raw_percentage * PUSHER_ORDER_SHARE),
            })
        })
        .collect();
    owners.sort_by(|a, b| {
        b.raw_percentage
            .total_cmp(&a.raw_percentage)
            .then_with(|| a.owner_id.cmp(&b.owner_id))
    });

    let total_allocated = round_1dp(owners.iter().map(|o| o.allocated_percentage).sum());
    Some(DailyReport {
        owners,
        total_allocated,
        remainder: round_1dp(100.0 - total_allocated),
    })
}
