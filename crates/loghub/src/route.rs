use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::params::SearchParams;

/// Declarative match predicate attached to a backend.
///
/// Empty fields are wildcards; a rule with every field empty matches any
/// query. Label values are comma-separated alternatives: the rule matches
/// when, for every configured key, the query carries that key with one of
/// the listed values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteRule {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "idPrefix")]
    pub id_prefix: String,
    pub labels: BTreeMap<String, String>,
    /// A matching additive rule adds its backend to the candidate set
    /// without excluding others.
    pub additive: bool,
}

impl RouteRule {
    /// Whether this rule matches the query. Pure; never errors.
    pub fn matches(&self, params: &SearchParams) -> bool {
        if !self.kind.is_empty() && self.kind != params.kind {
            return false;
        }

        if !self.id_prefix.is_empty() && !params.id.starts_with(&self.id_prefix) {
            return false;
        }

        for (key, allowed) in &self.labels {
            let Some(value) = params.labels.get(key) else {
                return false;
            };
            if !allowed.split(',').any(|candidate| candidate.trim() == value) {
                return false;
            }
        }

        true
    }
}

/// Evaluate rules in configured order and return `(matched, additive)`
/// for the first match, or `(false, false)` when none match.
pub fn match_route(rules: &[RouteRule], params: &SearchParams) -> (bool, bool) {
    for rule in rules {
        if rule.matches(params) {
            return (true, rule.additive);
        }
    }

    (false, false)
}
