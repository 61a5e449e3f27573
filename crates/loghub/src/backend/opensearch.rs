use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use handlebars::Handlebars;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::backend::normalize::{is_excluded, stringify, take_page};
use crate::backend::{normalize, LogBackend, StoreTransport};
use crate::config::StoreConfig;
use crate::error::{Result, SearchError};
use crate::params::SearchParams;
use crate::result::{LogResult, SearchResults};

const QUERY_TEMPLATE: &str = "query";

/// Structured-log-store adapter over a typed response envelope.
///
/// The query template renders against the full search parameters. The
/// exclusion patterns name source fields whose value, when equal to the
/// extracted message, marks the record as duplicated content to drop.
/// Labels are taken verbatim from the configured label fields.
pub struct OpenSearchBackend {
    transport: Arc<dyn StoreTransport>,
    template: Handlebars<'static>,
    index: String,
    timestamp_field: String,
    message_field: String,
    label_fields: Vec<String>,
    exclusions: Vec<Regex>,
}

impl std::fmt::Debug for OpenSearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchBackend")
            .field("index", &self.index)
            .field("timestamp_field", &self.timestamp_field)
            .field("message_field", &self.message_field)
            .field("label_fields", &self.label_fields)
            .field("exclusions", &self.exclusions)
            .finish()
    }
}

/// Response envelope. Defaults everywhere keep a missing or partial hits
/// section decodable as an empty result.
#[derive(Debug, Default, Deserialize)]
struct StoreResponse {
    #[serde(default)]
    hits: HitSet,
}

#[derive(Debug, Default, Deserialize)]
struct HitSet {
    #[serde(default)]
    total: TotalHits,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Default, Deserialize)]
struct TotalHits {
    #[serde(default)]
    value: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Hit {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    sort: Vec<Value>,
    #[serde(rename = "_source", default)]
    source: serde_json::Map<String, Value>,
}

impl OpenSearchBackend {
    pub fn new(config: &StoreConfig, transport: Arc<dyn StoreTransport>) -> Result<Self> {
        if config.index.is_empty() {
            return Err(SearchError::Config("index is empty".to_string()));
        }

        let mut template = Handlebars::new();
        // Query bodies are JSON, not HTML.
        template.register_escape_fn(handlebars::no_escape);
        template.register_template_string(QUERY_TEMPLATE, &config.query)?;

        Ok(Self {
            transport,
            template,
            index: config.index.clone(),
            timestamp_field: config.fields.timestamp.clone(),
            message_field: config.fields.message.clone(),
            label_fields: config.fields.labels.clone(),
            exclusions: normalize::compile_exclusions(&config.fields.exclusions)?,
        })
    }

    fn result_from_hit(&self, hit: &Hit) -> Option<LogResult> {
        let Some(message) = hit.source.get(&self.message_field) else {
            debug!("message field [{}] not found, dropping record", self.message_field);
            return None;
        };
        let message = stringify(message);

        // A field named by an exclusion pattern carrying the message text
        // again means this record duplicates content already returned.
        for (name, value) in &hit.source {
            if is_excluded(name, &self.exclusions) && stringify(value) == message {
                debug!("record {} duplicates excluded field [{name}]", hit.id);
                return None;
            }
        }

        let time = hit
            .source
            .get(&self.timestamp_field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut labels = BTreeMap::new();
        for field in &self.label_fields {
            if let Some(value) = hit.source.get(field) {
                labels.insert(field.clone(), stringify(value));
            }
        }

        Some(LogResult {
            id: hit.id.clone(),
            time,
            message,
            labels,
        })
    }
}

#[async_trait]
impl LogBackend for OpenSearchBackend {
    async fn search(&self, params: &SearchParams) -> Result<SearchResults> {
        let body = self.template.render(QUERY_TEMPLATE, params)?;

        let limit = params.limit.max(0);
        let value = self.transport.search(&self.index, &body, limit + 1).await?;
        let decoded: StoreResponse = serde_json::from_value(value)?;

        let total = decoded.hits.total.value.max(0) as usize;
        let mut rows = decoded.hits.hits;

        let next_page = take_page(&mut rows, limit as usize, |row| {
            if row.sort.is_empty() {
                Value::Null
            } else {
                Value::Array(row.sort.clone())
            }
        });

        let results = rows
            .iter()
            .filter_map(|hit| self.result_from_hit(hit))
            .collect();

        Ok(SearchResults {
            total,
            results,
            next_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeStoreTransport;
    use crate::config::FieldMapping;
    use serde_json::json;

    fn store_config() -> StoreConfig {
        StoreConfig {
            address: "http://store:9200".to_string(),
            query: r#"{"q":"{{query}}","from":"{{start}}"}"#.to_string(),
            index: "app-logs".to_string(),
            fields: FieldMapping {
                timestamp: "ts".to_string(),
                message: "msg".to_string(),
                exclusions: vec!["^raw$".to_string()],
                labels: vec!["host".to_string(), "level".to_string()],
            },
            routes: Vec::new(),
        }
    }

    fn response(hits: Value) -> Value {
        json!({
            "took": 2,
            "timed_out": false,
            "hits": {"total": {"value": 7, "relation": "eq"}, "hits": hits},
        })
    }

    #[test]
    fn test_new_rejects_empty_index() {
        let mut config = store_config();
        config.index.clear();

        let err =
            OpenSearchBackend::new(&config, Arc::new(FakeStoreTransport::new())).unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[test]
    fn test_new_rejects_bad_template() {
        let mut config = store_config();
        config.query = "{{#each}".to_string();

        assert!(OpenSearchBackend::new(&config, Arc::new(FakeStoreTransport::new())).is_err());
    }

    #[tokio::test]
    async fn test_search_renders_template_against_params() {
        let transport = Arc::new(FakeStoreTransport::new());
        transport.push_response(response(json!([])));
        let backend = OpenSearchBackend::new(&store_config(), transport.clone()).unwrap();

        let params = SearchParams {
            limit: 5,
            query: "level:error".to_string(),
            start: "2024-01-01T00:00:00Z".to_string(),
            ..Default::default()
        };
        backend.search(&params).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].index, "app-logs");
        assert_eq!(requests[0].size, 6);
        assert!(requests[0].body.contains("level:error"));
        assert!(requests[0].body.contains("2024-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_search_extracts_configured_fields() {
        let transport = Arc::new(FakeStoreTransport::new());
        transport.push_response(response(json!([
            {
                "_id": "r1",
                "sort": [1700000000],
                "_source": {
                    "ts": "2024-01-01T00:00:00Z",
                    "msg": "worker crashed",
                    "host": "node-1",
                    "level": "error",
                    "ignored": "field",
                },
            },
        ])));
        let backend = OpenSearchBackend::new(&store_config(), transport).unwrap();

        let params = SearchParams {
            limit: 10,
            ..Default::default()
        };
        let found = backend.search(&params).await.unwrap();

        assert_eq!(found.total, 7);
        let result = &found.results[0];
        assert_eq!(result.id, "r1");
        assert_eq!(result.time, "2024-01-01T00:00:00Z");
        assert_eq!(result.message, "worker crashed");
        assert_eq!(result.labels.get("host").map(String::as_str), Some("node-1"));
        assert_eq!(result.labels.get("level").map(String::as_str), Some("error"));
        assert!(result.labels.get("ignored").is_none());
    }

    #[tokio::test]
    async fn test_search_drops_duplicate_content_records() {
        let transport = Arc::new(FakeStoreTransport::new());
        transport.push_response(response(json!([
            {"_id": "dup", "_source": {"msg": "same text", "raw": "same text"}},
            {"_id": "kept", "_source": {"msg": "same text", "raw": "different"}},
        ])));
        let backend = OpenSearchBackend::new(&store_config(), transport).unwrap();

        let params = SearchParams {
            limit: 10,
            ..Default::default()
        };
        let found = backend.search(&params).await.unwrap();

        assert_eq!(found.results.len(), 1);
        assert_eq!(found.results[0].id, "kept");
    }

    #[tokio::test]
    async fn test_search_over_fetch_pagination() {
        let transport = Arc::new(FakeStoreTransport::new());
        transport.push_response(response(json!([
            {"_id": "r1", "sort": [100], "_source": {"msg": "a"}},
            {"_id": "r2", "sort": [200], "_source": {"msg": "b"}},
            {"_id": "r3", "sort": [300, "tiebreak"], "_source": {"msg": "c"}},
        ])));
        let backend = OpenSearchBackend::new(&store_config(), transport).unwrap();

        let params = SearchParams {
            limit: 2,
            ..Default::default()
        };
        let found = backend.search(&params).await.unwrap();

        assert_eq!(found.results.len(), 2);
        assert_eq!(found.next_page, r#"[300,"tiebreak"]"#);
    }

    #[tokio::test]
    async fn test_search_tolerates_missing_hits_section() {
        let transport = Arc::new(FakeStoreTransport::new());
        transport.push_response(json!({"took": 2}));
        let backend = OpenSearchBackend::new(&store_config(), transport).unwrap();

        let found = backend.search(&SearchParams::default()).await.unwrap();
        assert_eq!(found.total, 0);
        assert!(found.results.is_empty());
    }

    #[tokio::test]
    async fn test_search_rejects_malformed_envelope() {
        let transport = Arc::new(FakeStoreTransport::new());
        transport.push_response(json!({"hits": "not an object"}));
        let backend = OpenSearchBackend::new(&store_config(), transport).unwrap();

        let err = backend.search(&SearchParams::default()).await.unwrap_err();
        assert!(matches!(err, SearchError::Decode(_)));
    }
}
