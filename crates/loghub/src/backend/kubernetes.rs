use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::LogBackend;
use crate::error::Result;
use crate::params::SearchParams;
use crate::result::SearchResults;

/// External orchestrator log-fetch handle. The real implementation talks
/// to the cluster API keyed by the query's type, id, and the configured
/// namespace; this core only consumes the boundary.
#[async_trait]
pub trait PodLogSource: Send + Sync {
    async fn fetch(&self, namespace: &str, params: &SearchParams) -> Result<SearchResults>;
}

/// Orchestrator-native log source adapter.
pub struct KubernetesBackend {
    namespace: String,
    client: Arc<dyn PodLogSource>,
}

impl KubernetesBackend {
    pub fn new(namespace: String, client: Arc<dyn PodLogSource>) -> Self {
        Self { namespace, client }
    }
}

#[async_trait]
impl LogBackend for KubernetesBackend {
    async fn search(&self, params: &SearchParams) -> Result<SearchResults> {
        let mut found = self.client.fetch(&self.namespace, params).await?;

        // Container runtimes prefix each line with its write timestamp;
        // promote it so callers get a clean message and a usable time.
        found.results = found
            .results
            .into_iter()
            .map(|result| result.promote_timestamp())
            .collect();

        Ok(found)
    }
}
