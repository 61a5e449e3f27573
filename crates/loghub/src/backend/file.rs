use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::backend::LogBackend;
use crate::config::FileConfig;
use crate::error::Result;
use crate::params::SearchParams;
use crate::result::{LogResult, SearchResults};

/// File-based log source. Paths are expected to be absolute by the time
/// the backend is constructed; the config loader resolves relative paths
/// against the config file's directory.
pub struct FileBackend {
    config: FileConfig,
}

impl FileBackend {
    pub fn new(config: FileConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LogBackend for FileBackend {
    async fn search(&self, params: &SearchParams) -> Result<SearchResults> {
        let window = params.window();
        let mut results = Vec::new();

        for path in &self.config.paths {
            let content = match tokio::fs::read_to_string(path).await {
                Ok(content) => content,
                Err(err) => {
                    warn!("skipping log file {path}: {err}");
                    continue;
                }
            };

            for line in content.lines() {
                if line.is_empty() {
                    continue;
                }
                if !params.query.is_empty() && !line.contains(&params.query) {
                    continue;
                }

                let mut labels = self.config.labels.clone();
                labels.insert("path".to_string(), path.clone());

                let result = LogResult {
                    message: line.to_string(),
                    labels,
                    ..Default::default()
                }
                .promote_timestamp();

                // Records carrying a parseable timestamp are bounded by the
                // resolved window; records without one always pass.
                if let Ok(ts) = DateTime::parse_from_rfc3339(&result.time) {
                    if !window.contains(ts.with_timezone(&Utc)) {
                        continue;
                    }
                }

                results.push(result);
            }
        }

        let total = results.len();
        apply_limits(&mut results, params.limit, params.limit_bytes);
        if results.len() < total {
            debug!(
                "file search truncated {} of {} matching lines",
                total - results.len(),
                total
            );
        }

        Ok(SearchResults {
            total,
            results,
            next_page: String::new(),
        })
    }
}

fn apply_limits(results: &mut Vec<LogResult>, limit: i64, limit_bytes: i64) {
    if limit > 0 && results.len() > limit as usize {
        results.truncate(limit as usize);
    }

    if limit_bytes > 0 {
        let mut budget = limit_bytes as usize;
        let mut keep = 0;
        for result in results.iter() {
            if result.message.len() > budget {
                break;
            }
            budget -= result.message.len();
            keep += 1;
        }
        results.truncate(keep);
    }
}
