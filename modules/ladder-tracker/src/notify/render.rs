// Plain-text rendering shared by every reporter.

use std::fmt::Write;

use ladder_common::{AppliedDelta, DailyReport, LeaderboardEntry};

use crate::report::PUSHER_ORDER_SHARE;
use crate::scoring::POINT_TABLE;

/// Owners shown on the leaderboard.
pub const LEADERBOARD_SIZE: usize = 10;
/// Owners with at most this many accounts get a per-account breakdown.
const DETAIL_MAX_ACCOUNTS: usize = 3;

pub fn scoring(deltas: &[AppliedDelta]) -> String {
    if deltas.is_empty() {
        return "No linked players found in top 8, nothing to update".to_string();
    }

    let mut out = String::from("Points Updated\n");
    for d in deltas {
        let _ = writeln!(
            out,
            "#{} - {} ({}): +{} points | Total: {}",
            d.rank, d.name, d.tag, d.delta, d.new_total
        );
    }
    out
}

pub fn leaderboard(entries: &[LeaderboardEntry]) -> String {
    let mut out = String::from("Points Leaderboard\n");
    if entries.is_empty() {
        out.push_str("No players have been linked yet.\n");
        return out;
    }

    for (i, entry) in entries.iter().take(LEADERBOARD_SIZE).enumerate() {
        let _ = writeln!(
            out,
            "{}. {} | Total Points: {} | Accounts: {}",
            i + 1,
            entry.owner_id,
            entry.total_points,
            entry.account_count
        );
        if entry.account_count <= DETAIL_MAX_ACCOUNTS {
            let details: Vec<String> = entry
                .accounts
                .iter()
                .map(|(tag, points)| format!("{tag}: {points}"))
                .collect();
            let _ = writeln!(out, "   {}", details.join(", "));
        }
    }

    out.push_str("Point System\n");
    for (rank, points) in POINT_TABLE {
        let _ = writeln!(out, "Top {rank}: {points} pts/hr");
    }
    out
}

pub fn daily(report: &DailyReport) -> String {
    let mut out = format!(
        "Daily Orders Breakdown ({:.0}% of total orders dedicated to pushers)\n",
        PUSHER_ORDER_SHARE * 100.0
    );
    for (i, owner) in report.owners.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} | Total Points: {} | Linked Accounts: {} | Orders: {}%",
            i + 1,
            owner.owner_id,
            owner.total_points,
            owner.account_count,
            owner.allocated_percentage
        );
    }
    let _ = writeln!(out, "Total Orders Allocated: {}%", report.total_allocated);
    let _ = writeln!(
        out,
        "Remaining {}% allocated to other categories",
        report.remainder
    );
    out
}
