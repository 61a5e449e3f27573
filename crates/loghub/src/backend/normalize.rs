use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use crate::error::{Result, SearchError};

/// Render a decoded JSON value as its canonical text: strings pass through
/// unchanged, everything else serializes to JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compile a list of field-name patterns, failing the owning backend's
/// construction on the first invalid one.
pub fn compile_exclusions(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|err| {
                SearchError::Config(format!("invalid exclusion pattern [{pattern}]: {err}"))
            })
        })
        .collect()
}

pub fn is_excluded(name: &str, exclusions: &[Regex]) -> bool {
    exclusions.iter().any(|pattern| pattern.is_match(name))
}

/// Flatten a decoded source object into a single-level label map with
/// dot-joined compound keys. Values are stringified; keys matching an
/// exclusion pattern are dropped.
pub fn flatten_labels(
    source: &serde_json::Map<String, Value>,
    exclusions: &[Regex],
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    for (key, value) in source {
        flatten_into(key, value, exclusions, &mut labels);
    }
    labels
}

fn flatten_into(
    key: &str,
    value: &Value,
    exclusions: &[Regex],
    labels: &mut BTreeMap<String, String>,
) {
    if is_excluded(key, exclusions) {
        return;
    }
    match value {
        Value::Object(map) => {
            for (child, value) in map {
                flatten_into(&format!("{key}.{child}"), value, exclusions, labels);
            }
        }
        other => {
            labels.insert(key.to_string(), stringify(other));
        }
    }
}

/// Cursor-based pagination over an over-fetched result page.
///
/// The backend was asked for `limit + 1` rows. When it returns more than
/// `limit`, the surplus row is discarded and its stringified sort key
/// becomes the next-page cursor; otherwise the page is final and the
/// cursor is empty.
pub fn take_page<T>(rows: &mut Vec<T>, limit: usize, sort_key: impl Fn(&T) -> Value) -> String {
    if rows.len() <= limit {
        return String::new();
    }

    let surplus = rows.split_off(limit);
    match surplus.first() {
        Some(row) => match &sort_key(row) {
            Value::Null => String::new(),
            key => stringify(key),
        },
        None => String::new(),
    }
}
