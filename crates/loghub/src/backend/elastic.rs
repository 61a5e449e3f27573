use std::sync::Arc;

use async_trait::async_trait;
use handlebars::Handlebars;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::backend::normalize::{flatten_labels, stringify, take_page};
use crate::backend::{normalize, LogBackend, StoreTransport};
use crate::config::StoreConfig;
use crate::error::{Result, SearchError};
use crate::params::SearchParams;
use crate::result::{LogResult, SearchResults};

const QUERY_TEMPLATE: &str = "query";

/// Structured-log-store adapter over the untyped response envelope.
///
/// The query template renders against the request's labels. Source
/// documents are flattened into dot-joined labels; the configured
/// exclusion patterns name label keys to leave out.
pub struct ElasticBackend {
    transport: Arc<dyn StoreTransport>,
    template: Handlebars<'static>,
    index: String,
    timestamp_field: String,
    message_field: String,
    exclusions: Vec<Regex>,
}

impl std::fmt::Debug for ElasticBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticBackend")
            .field("index", &self.index)
            .field("timestamp_field", &self.timestamp_field)
            .field("message_field", &self.message_field)
            .field("exclusions", &self.exclusions)
            .finish()
    }
}

impl ElasticBackend {
    pub fn new(config: &StoreConfig, transport: Arc<dyn StoreTransport>) -> Result<Self> {
        if config.index.is_empty() {
            return Err(SearchError::Config("index is empty".to_string()));
        }
        if config.fields.message.is_empty() {
            return Err(SearchError::Config("message field is not set".to_string()));
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
            exclusions: normalize::compile_exclusions(&config.fields.exclusions)?,
        })
    }

    fn result_from_hit(&self, hit: &Value) -> Option<LogResult> {
        let source = hit.get("_source")?.as_object()?;

        let Some(message) = source.get(&self.message_field) else {
            debug!("message field [{}] not found, dropping record", self.message_field);
            return None;
        };
        let message = stringify(message);

        let time = source
            .get(&self.timestamp_field)
            .map(stringify)
            .unwrap_or_default();

        let mut remainder = source.clone();
        remainder.remove(&self.message_field);
        remainder.remove(&self.timestamp_field);
        let mut labels = flatten_labels(&remainder, &self.exclusions);

        if let Some(index) = hit.get("_index").and_then(Value::as_str) {
            labels.insert("index".to_string(), index.to_string());
        }

        Some(LogResult {
            id: hit
                .get("_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            time,
            message,
            labels,
        })
    }
}

#[async_trait]
impl LogBackend for ElasticBackend {
    async fn search(&self, params: &SearchParams) -> Result<SearchResults> {
        let body = self.template.render(QUERY_TEMPLATE, &params.labels)?;

        let limit = params.limit.max(0);
        let value = self.transport.search(&self.index, &body, limit + 1).await?;

        // A response without a hits section is an empty result, not a
        // failure.
        let Some(hits) = value.get("hits").and_then(Value::as_object) else {
            return Ok(SearchResults::default());
        };

        let total = hits
            .get("total")
            .and_then(|total| total.get("value"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;

        let mut rows: Vec<Value> = hits
            .get("hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let next_page = take_page(&mut rows, limit as usize, |row| {
            row.get("sort").cloned().unwrap_or(Value::Null)
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
