use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::LadderError;

/// Player tags use a fixed 14-character alphabet and are at least 3 long.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0289PYLQGRJCUV]{3,}$").expect("valid regex"));

// =============================================================================
// Tag
// =============================================================================

/// A normalized player tag: no leading `#`, uppercase, validated alphabet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Strip any `#` and uppercase. Does not validate.
    pub fn normalize(raw: &str) -> String {
        raw.replace('#', "").trim().to_uppercase()
    }

    /// Normalize and validate a raw tag as typed by an admin or scraped from a page.
    pub fn parse(raw: &str) -> Result<Self, LadderError> {
        let normalized = Self::normalize(raw);
        if TAG_RE.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(LadderError::InvalidTag(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for Tag {
    type Err = LadderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Tag::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Owner
// =============================================================================

/// Opaque identifier of the external account that owns one or more tags.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Older data files stored the owner as a bare integer account id.
impl<'de> Deserialize<'de> for OwnerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(Self(s)),
            Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "owner id must be a string or integer, got {other}"
            ))),
        }
    }
}

// =============================================================================
// Identity records
// =============================================================================

/// One linked player account. Keyed by [`Tag`] in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    #[serde(alias = "discord_id")]
    pub owner_id: OwnerId,
    #[serde(default)]
    pub points: u64,
    #[serde(alias = "name", default)]
    pub display_name: String,
}

impl IdentityRecord {
    pub fn new(owner_id: OwnerId, display_name: impl Into<String>) -> Self {
        Self {
            owner_id,
            points: 0,
            display_name: display_name.into(),
        }
    }
}

// =============================================================================
// Scrape cycle types
// =============================================================================

/// The rank field of a scraped entry, exactly as the page provided it.
///
/// Coercion to an integer is explicit via [`RawRank::coerce`]; a missing
/// field coerces to the sentinel `0`, which is worth no points.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRank {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
    /// Present but of a type that can never be a rank (null, bool, object, array).
    /// Booleans are not read as 0/1.
    Unusable(String),
}

impl RawRank {
    pub const SENTINEL: i64 = 0;

    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None => Self::Missing,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Unusable(n.to_string())),
            },
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Unusable(other.to_string()),
        }
    }

    /// Total coercion: never panics, `None` means "not a rank".
    pub fn coerce(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
            Self::Missing => Some(Self::SENTINEL),
            Self::Unusable(_) => None,
        }
    }
}

impl fmt::Display for RawRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Missing => f.write_str("<missing>"),
            Self::Unusable(raw) => f.write_str(raw),
        }
    }
}

/// One leaderboard entry pulled out of the page. Lives for one scrape cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedRecord {
    /// Raw tag as found on the page (may carry `#`, may be lowercase, may be empty).
    pub tag: String,
    pub name: String,
    pub rank: RawRank,
}

impl ScrapedRecord {
    /// Build from one element of the embedded array. Returns `None` for non-objects.
    ///
    /// `rank` wins over `position` when both are present.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let tag = obj
            .get("tag")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let rank = RawRank::from_json(obj.get("rank").or_else(|| obj.get("position")));
        Some(Self { tag, name, rank })
    }
}

/// A scraped entry whose tag is linked in the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RankMatch {
    pub tag: Tag,
    pub name: String,
    pub rank: RawRank,
}

/// A point award that was applied to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedDelta {
    pub tag: Tag,
    pub name: String,
    pub rank: i64,
    pub delta: u64,
    pub new_total: u64,
}

// =============================================================================
// Report types
// =============================================================================

/// Per-owner standing for the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub owner_id: OwnerId,
    pub total_points: u64,
    pub account_count: usize,
    /// Per-account points, in tag order.
    pub accounts: Vec<(Tag, u64)>,
}

/// Per-owner line of the daily allocation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerAllocation {
    pub owner_id: OwnerId,
    pub total_points: u64,
    pub account_count: usize,
    pub raw_percentage: f64,
    pub allocated_percentage: f64,
}

/// Daily allocation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub owners: Vec<OwnerAllocation>,
    pub total_allocated: f64,
    pub remainder: f64,
}

/// All linked accounts of a single owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerAccounts {
    pub owner_id: OwnerId,
    pub accounts: Vec<(Tag, u64)>,
    pub total_points: u64,
}

/// Per-owner summary across the whole registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerSummary {
    pub owner_id: OwnerId,
    pub account_count: usize,
    pub total_points: u64,
}
