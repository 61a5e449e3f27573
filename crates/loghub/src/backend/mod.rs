//! Backend adapters: one implementation of the search capability per
//! backend technology, plus the registration envelope the registry holds.

pub mod elastic;
pub mod file;
pub mod kubernetes;
pub mod normalize;
pub mod opensearch;
pub mod transport;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::params::SearchParams;
use crate::result::SearchResults;
use crate::route::{self, RouteRule};

pub use elastic::ElasticBackend;
pub use file::FileBackend;
pub use kubernetes::{KubernetesBackend, PodLogSource};
pub use opensearch::OpenSearchBackend;
pub use transport::{FakeStoreTransport, HttpStoreTransport, RecordedSearch, StoreTransport};

/// The search capability every backend exposes.
///
/// Implementations must be `Send + Sync`; the router may run several
/// searches concurrently and no implementation may assume exclusive
/// access to anything but its own transport handle.
#[async_trait]
pub trait LogBackend: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<SearchResults>;
}

/// Backend technology discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Kubernetes,
    File,
    Elasticsearch,
    Opensearch,
}

impl BackendKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::File => "file",
            Self::Elasticsearch => "elasticsearch",
            Self::Opensearch => "opensearch",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured backend instance held by the registry: the capability,
/// the routing rules that decide when it answers, and the content hash
/// that is its identity during reconciliation.
///
/// Registrations are immutable once published; configuration changes
/// replace the entry wholesale.
#[derive(Clone)]
pub struct RegisteredBackend {
    kind: BackendKind,
    hash: String,
    routes: Vec<RouteRule>,
    api: Arc<dyn LogBackend>,
}

impl RegisteredBackend {
    pub fn new(
        kind: BackendKind,
        hash: String,
        routes: Vec<RouteRule>,
        api: Arc<dyn LogBackend>,
    ) -> Self {
        Self {
            kind,
            hash,
            routes,
            api,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Content hash of this registration's configuration.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn routes(&self) -> &[RouteRule] {
        &self.routes
    }

    /// Evaluate this registration's routing rules against a query.
    pub fn match_route(&self, params: &SearchParams) -> (bool, bool) {
        route::match_route(&self.routes, params)
    }

    pub async fn search(&self, params: &SearchParams) -> Result<SearchResults> {
        self.api.search(params).await
    }

    /// Short diagnostic name, e.g. `elasticsearch/9f2c01ab`.
    pub fn label(&self) -> String {
        let short = &self.hash[..self.hash.len().min(8)];
        format!("{}/{}", self.kind, short)
    }
}

impl fmt::Debug for RegisteredBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredBackend")
            .field("kind", &self.kind)
            .field("hash", &self.hash)
            .field("routes", &self.routes.len())
            .finish()
    }
}
