use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_START: &str = "1h";
const DEFAULT_LIMIT: i64 = 50;
const DEFAULT_LIMIT_PER_ITEM: i64 = 100;
const DEFAULT_LIMIT_BYTES_PER_ITEM: i64 = 100 * 1024;

/// Normalized search request consumed by every backend.
///
/// `start` and `end` accept either an RFC3339 timestamp or an age string
/// (e.g. "15m", "1h", "2d"). Resolution against the wall clock happens at
/// most once per value; see [`SearchParams::window`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchParams {
    /// Maximum number of results to return.
    pub limit: i64,
    pub limit_bytes: i64,
    /// Opaque continuation cursor returned by a previous call.
    pub page: String,
    /// Labels to filter the results, ANDed.
    pub labels: BTreeMap<String, String>,
    /// Free-form query string, passed to the backend where supported,
    /// otherwise applied as a post-filter on the returned results.
    pub query: String,
    pub start: String,
    pub end: String,
    /// The type of logs to find, e.g. KubernetesPod, VM. Type and id
    /// drive request routing.
    #[serde(rename = "type")]
    pub kind: String,
    /// Identifier of the thing whose logs to find, including any
    /// cluster/namespace/account information required for routing.
    pub id: String,
    /// Maximum number of log messages per item, e.g. per pod.
    pub limit_per_item: i64,
    /// Maximum number of bytes per item.
    pub limit_bytes_per_item: i64,

    // Resolved-window cache; filled on first access through `window()`.
    #[serde(skip)]
    pub(crate) window: OnceLock<TimeWindow>,
}

/// Resolved absolute time range of a search request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Whether a timestamp falls inside the window. Open bounds match.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if ts < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if ts > end {
                return false;
            }
        }
        true
    }
}

impl SearchParams {
    /// Fill in the default values for fields the caller left unset.
    pub fn set_defaults(&mut self) {
        if self.start.is_empty() {
            self.start = DEFAULT_START.to_string();
        }
        if self.limit <= 0 {
            self.limit = DEFAULT_LIMIT;
        }
        if self.limit_per_item == 0 {
            self.limit_per_item = DEFAULT_LIMIT_PER_ITEM;
        }
        if self.limit_bytes_per_item == 0 {
            self.limit_bytes_per_item = DEFAULT_LIMIT_BYTES_PER_ITEM;
        }
    }

    /// Resolve `start`/`end` against the given instant. Pure: the same
    /// inputs always produce the same window. Unparseable values resolve
    /// to an open bound.
    pub fn resolve_window(&self, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow {
            start: resolve_bound(&self.start, now),
            end: resolve_bound(&self.end, now),
        }
    }

    /// The resolved time window of this request.
    ///
    /// Resolution runs once, on first access; later calls return the
    /// identical cached instants so a request stays self-consistent no
    /// matter how many backends inspect it.
    pub fn window(&self) -> &TimeWindow {
        self.window.get_or_init(|| self.resolve_window(Utc::now()))
    }

    /// Resolved start rendered with millisecond precision, the format
    /// structured log stores take in range clauses. Empty when the start
    /// bound is open.
    pub fn start_rfc3339(&self) -> String {
        match self.window().start {
            Some(start) => start.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            None => String::new(),
        }
    }
}

fn resolve_bound(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    if let Some(age) = parse_age(value) {
        return Some(now - age);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Parse an age string like "90s", "15m", "1h", "2d" or "1w".
fn parse_age(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = value.split_at(split);
    let count: i64 = digits.parse().ok()?;
    match unit {
        "s" => Duration::try_seconds(count),
        "m" => Duration::try_minutes(count),
        "h" => Duration::try_hours(count),
        "d" => Duration::try_days(count),
        "w" => Duration::try_weeks(count),
        _ => None,
    }
}

impl fmt::Display for SearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.kind.is_empty() {
            write!(f, "type={} ", self.kind)?;
        }
        if !self.id.is_empty() {
            write!(f, "id={} ", self.id)?;
        }
        if !self.start.is_empty() {
            write!(f, "start={} ", self.start)?;
        }
        if !self.end.is_empty() {
            write!(f, "end={} ", self.end)?;
        }
        if !self.query.is_empty() {
            write!(f, "query={} ", self.query)?;
        }
        if !self.labels.is_empty() {
            write!(f, "labels={:?} ", self.labels)?;
        }
        if self.limit > 0 {
            write!(f, "limit={} ", self.limit)?;
        }
        if !self.page.is_empty() {
            write!(f, "page={} ", self.page)?;
        }
        Ok(())
    }
}
