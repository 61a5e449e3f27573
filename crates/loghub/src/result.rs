use std::collections::BTreeMap;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// One normalized log record, backend-agnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogResult {
    /// Identifier provided by the underlying system; links to a point in
    /// time of a log stream. Opaque to this layer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// RFC3339 timestamp. Empty when none could be extracted.
    #[serde(rename = "timestamp", default, skip_serializing_if = "String::is_empty")]
    pub time: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl LogResult {
    /// Promote a leading RFC3339 token from the message into the `time`
    /// field. The token is removed from the message and surrounding
    /// whitespace trimmed; a message without a parseable leading token is
    /// left untouched.
    pub fn promote_timestamp(mut self) -> Self {
        if let Some(token) = self.message.split_whitespace().next() {
            if DateTime::parse_from_rfc3339(token).is_ok() {
                self.time = token.to_string();
                self.message = self.message.replacen(token, "", 1);
            }
        }
        self.message = self.message.trim().to_string();
        self
    }
}

/// Response envelope for one search call.
///
/// `total` semantics are backend-defined: exact where the backend reports
/// one, a lower bound otherwise. Result order is backend-native order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    #[serde(default)]
    pub total: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<LogResult>,
    /// Opaque continuation cursor. Empty means no further pages.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_page: String,
}

impl SearchResults {
    /// Merge another backend's results into this envelope: concatenate in
    /// order, sum totals, and adopt the other cursor when it is non-empty.
    pub fn append(&mut self, other: SearchResults) {
        self.results.extend(other.results);
        self.total += other.total;
        if !other.next_page.is_empty() {
            self.next_page = other.next_page;
        }
    }
}
