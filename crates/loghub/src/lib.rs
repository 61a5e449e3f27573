// Federated log search: one normalized query/response contract over
// heterogeneous log backends, with rule-based routing and a registry
// reconciled from declarative configuration.

// Core infrastructure
pub mod error;
pub mod hash;
pub mod params;
pub mod result;
pub mod route;

// Domain modules
pub mod backend;
pub mod config;
pub mod registry;
pub mod router;

pub use backend::{
    BackendKind, ElasticBackend, FakeStoreTransport, FileBackend, HttpStoreTransport,
    KubernetesBackend, LogBackend, OpenSearchBackend, PodLogSource, RecordedSearch,
    RegisteredBackend, StoreTransport,
};
pub use config::{
    BackendSpec, BuildFailure, BuildOutcome, FieldMapping, FileConfig, KubernetesConfig,
    SearchConfig, StoreConfig,
};
pub use error::SearchError;
pub use params::{SearchParams, TimeWindow};
pub use registry::BackendRegistry;
pub use result::{LogResult, SearchResults};
pub use route::{match_route, RouteRule};
pub use router::{BackendFailure, QueryRouter, RouteError, RouteOutcome};
