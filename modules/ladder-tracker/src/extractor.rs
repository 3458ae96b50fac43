// Page extractor: fetch the leaderboard page and pull the embedded player
// array out of raw markup.
//
// The page is not parsed as HTML. The data is assumed to sit in a script
// blob as a literal JSON array of objects carrying a "tag" key; we find
// candidate substrings by pattern, tidy trailing commas and try each one.

use std::borrow::Cow;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use ladder_common::ScrapedRecord;
use leaderboard_client::LeaderboardClient;

/// A JSON-array-of-objects shape where every object mentions "tag". A
/// dangling comma before the closing bracket is allowed.
static CANDIDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\[\s*\{.*?"tag".*?\}\s*(?:,\s*\{.*?"tag".*?\}\s*)*,?\s*\]"#)
        .expect("valid regex")
});
static TRAILING_BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\]").expect("valid regex"));
static TRAILING_BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\}").expect("valid regex"));

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExtractError {
    #[error("Could not find any embedded player data")]
    NoCandidates,

    #[error("No valid player JSON among {candidates} candidate(s)")]
    NoValidArray {
        candidates: usize,
        last_error: Option<String>,
    },
}

/// Where page text comes from. The HTTP client in production, canned HTML in tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl PageSource for LeaderboardClient {
    async fn fetch_page(&self, url: &str) -> anyhow::Result<String> {
        Ok(self.page(url).await?)
    }
}

/// Enforces a minimum spacing between fetches by making callers wait.
pub struct Cooldown {
    period: Duration,
    last: Mutex<Option<Instant>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Mutex::new(None),
        }
    }

    /// Suspend until `period` has passed since the previous call, then claim the slot.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.period;
            let now = Instant::now();
            if ready_at > now {
                debug!(wait_ms = (ready_at - now).as_millis() as u64, "Scrape cooldown active");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

pub struct PageExtractor {
    source: Box<dyn PageSource>,
    url: String,
    cooldown: Cooldown,
}

impl PageExtractor {
    pub fn new(source: Box<dyn PageSource>, url: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            source,
            url: url.into(),
            cooldown: Cooldown::new(cooldown),
        }
    }

    /// Fetch the page and extract its records. Every failure degrades to an
    /// empty result for this cycle.
    pub async fn fetch_and_extract(&self) -> Vec<ScrapedRecord> {
        self.cooldown.wait().await;

        let html = match self.source.fetch_page(&self.url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Error scraping leaderboard");
                return Vec::new();
            }
        };

        match extract_records(&html) {
            Ok(records) => {
                info!(count = records.len(), "Successfully extracted players from leaderboard");
                records
            }
            Err(ExtractError::NoValidArray { candidates, last_error }) => {
                error!(
                    url = %self.url,
                    candidates,
                    last_error = last_error.as_deref().unwrap_or("none"),
                    "No valid player JSON found in the page"
                );
                Vec::new()
            }
            Err(e) => {
                error!(url = %self.url, error = %e, "No player data found on leaderboard");
                Vec::new()
            }
        }
    }
}

/// All non-overlapping substrings that look like an embedded player array.
pub fn find_candidates(html: &str) -> Vec<&str> {
    CANDIDATE_RE.find_iter(html).map(|m| m.as_str()).collect()
}

/// Drop commas that directly precede a closing `]` or `}`. Clean JSON passes
/// through untouched.
pub fn strip_trailing_commas(json: &str) -> Cow<'_, str> {
    match TRAILING_BRACKET_RE.replace_all(json, "]") {
        Cow::Borrowed(s) => TRAILING_BRACE_RE.replace_all(s, "}"),
        Cow::Owned(s) => Cow::Owned(TRAILING_BRACE_RE.replace_all(&s, "}").into_owned()),
    }
}

/// Parse one candidate. Accepted only if it is a non-empty array whose first
/// element is an object with a `tag` field.
fn parse_candidate(candidate: &str) -> Result<Option<Vec<Value>>, serde_json::Error> {
    let cleaned = strip_trailing_commas(candidate);
    let value: Value = serde_json::from_str(&cleaned)?;
    let accepted = match value {
        Value::Array(items)
            if items
                .first()
                .and_then(Value::as_object)
                .is_some_and(|o| o.contains_key("tag")) =>
        {
            Some(items)
        }
        _ => None,
    };
    Ok(accepted)
}

/// Extract the first parseable player array from raw page text.
pub fn extract_array(html: &str) -> Result<Vec<Value>, ExtractError> {
    let candidates = find_candidates(html);
    if candidates.is_empty() {
        return Err(ExtractError::NoCandidates);
    }

    let mut last_error = None;
    for (i, candidate) in candidates.iter().enumerate() {
        match parse_candidate(candidate) {
            Ok(Some(items)) => {
                debug!(candidate = i, players = items.len(), "Parsed embedded player array");
                return Ok(items);
            }
            Ok(None) => {
                debug!(candidate = i, "Candidate is not a player array");
            }
            Err(e) => {
                debug!(candidate = i, error = %e, "Could not parse candidate JSON array");
                last_error = Some(e.to_string());
            }
        }
    }

    Err(ExtractError::NoValidArray {
        candidates: candidates.len(),
        last_error,
    })
}

/// Extract scraped records in page order. Non-object elements are dropped.
pub fn extract_records(html: &str) -> Result<Vec<ScrapedRecord>, ExtractError> {
    let items = extract_array(html)?;
    let total = items.len();
    let records: Vec<ScrapedRecord> = items.iter().filter_map(ScrapedRecord::from_json).collect();
    if records.len() < total {
        warn!(dropped = total - records.len(), "Skipped non-object entries in player array");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladder_common::RawRank;

    const CLEAN: &str = r##"<html><script>
        window.__DATA__ = {"players": [{"tag":"#2PYLQC","name":"Ana","rank":1},{"tag":"#8QG","name":"Bo","rank":2}]};
    </script></html>"##;

    const TRAILING: &str = r##"<html><script>
        window.__DATA__ = {"players": [{"tag":"#2PYLQC","name":"Ana","rank":1,},{"tag":"#8QG","name":"Bo","rank":2},
        ]};
    </script></html>"##;

    #[test]
    fn finds_embedded_array() {
        let records = extract_records(CLEAN).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag, "#2PYLQC");
        assert_eq!(records[1].rank, RawRank::Int(2));
    }

    #[test]
    fn trailing_commas_are_tolerated() {
        let clean = extract_records(CLEAN).unwrap();
        let messy = extract_records(TRAILING).unwrap();
        assert_eq!(messy.len(), clean.len());
        assert_eq!(messy, clean);
    }

    #[test]
    fn comma_stripping_is_idempotent() {
        let once = strip_trailing_commas(r#"[{"a":1,},{"b":[1,2,],},]"#).into_owned();
        assert_eq!(once, r#"[{"a":1},{"b":[1,2]}]"#);
        let twice = strip_trailing_commas(&once);
        assert_eq!(twice, once);
        assert!(matches!(twice, Cow::Borrowed(_)));
    }

    #[test]
    fn no_array_is_no_candidates() {
        assert_eq!(
            extract_array("<html><body>maintenance</body></html>"),
            Err(ExtractError::NoCandidates)
        );
    }

    #[test]
    fn unparseable_candidates_report_failure() {
        let html = r#"<script>var x = [{"tag": oops}];</script>"#;
        match extract_array(html) {
            Err(ExtractError::NoValidArray { candidates, last_error }) => {
                assert_eq!(candidates, 1);
                assert!(last_error.is_some());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn first_valid_candidate_wins() {
        let html = r##"
            <script>var broken = [{"tag": nope}];</script>
            <script>var good = [{"tag":"#9RJ","name":"Cy","rank":1}];</script>
            <script>var later = [{"tag":"#2PY","name":"Di","rank":1}];</script>
        "##;
        let records = extract_records(html).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag, "#9RJ");
    }

    #[test]
    fn array_without_tag_in_first_element_is_rejected() {
        let html = r##"<script>var x = [{"name":"no tag here"},{"tag":"#2PY"}];</script>"##;
        assert!(matches!(
            extract_array(html),
            Err(ExtractError::NoValidArray { .. })
        ));
    }

    #[test]
    fn nested_objects_inside_entries() {
        let html = r##"<script>[{"tag":"#2PY","name":"A","clan":{"name":"C"},"rank":1},{"tag":"#8QG","name":"B","rank":2}]</script>"##;
        let records = extract_records(html).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "B");
    }

    #[tokio::test]
    async fn cooldown_spaces_calls() {
        let cooldown = Cooldown::new(Duration::from_millis(60));
        let start = Instant::now();
        cooldown.wait().await;
        assert!(start.elapsed() < Duration::from_millis(60));
        cooldown.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
