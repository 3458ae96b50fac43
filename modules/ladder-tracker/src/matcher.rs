use tracing::info;

use ladder_common::{RankMatch, ScrapedRecord, Tag};

use crate::registry::Registry;

/// Only this many leading entries of a scrape can score.
pub const TOP_RANKS: usize = 8;

/// Linked players among the first [`TOP_RANKS`] scraped entries, in page order.
///
/// Records are taken in the order the extractor produced them; no sort is
/// applied. Entries with an empty or unparseable tag are ignored.
pub fn match_top_ranks(records: &[ScrapedRecord], registry: &Registry) -> Vec<RankMatch> {
    records
        .iter()
        .take(TOP_RANKS)
        .filter_map(|record| {
            let tag = Tag::parse(&record.tag).ok()?;
            if !registry.contains(&tag) {
                return None;
            }
            info!(rank = %record.rank, name = %record.name, tag = %tag, "Found linked player in top ranks");
            Some(RankMatch {
                tag,
                name: record.name.clone(),
                rank: record.rank.clone(),
            })
        })
        .collect()
}
