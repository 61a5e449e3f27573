use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::SearchError;
use crate::params::SearchParams;
use crate::registry::BackendRegistry;
use crate::result::SearchResults;

/// One backend's failure during a routed search, identified by the
/// backend's diagnostic label.
#[derive(Debug)]
pub struct BackendFailure {
    pub backend: String,
    pub error: SearchError,
}

/// Outcome of a routed search: the merged results of every backend that
/// answered plus the failures of those that did not. A non-empty
/// `failures` with a populated `results` is a partial success.
#[derive(Debug, Default)]
pub struct RouteOutcome {
    pub results: SearchResults,
    pub failures: Vec<BackendFailure>,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("all {} candidate backends failed", failures.len())]
    AllBackendsFailed { failures: Vec<BackendFailure> },
}

/// Entry point that fans a query out to every matching backend and merges
/// what comes back.
pub struct QueryRouter {
    registry: Arc<BackendRegistry>,
}

impl QueryRouter {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    /// Route one query: apply defaults, select candidate backends, search
    /// them concurrently, and merge.
    ///
    /// Results concatenate in candidate-registration order with each
    /// backend's native ordering preserved; totals sum; the last
    /// non-empty cursor wins (cursors are backend-specific, merging does
    /// not unify pagination across backends). A failing backend is
    /// reported in the outcome without aborting the call; only a total
    /// failure is an error. No timeout is applied here: callers wrap the
    /// whole call in their own deadline.
    pub async fn route(&self, mut params: SearchParams) -> Result<RouteOutcome, RouteError> {
        params.set_defaults();
        // Pin the time window before fan-out so every backend sees the
        // same resolved instants.
        let _ = params.window();

        let candidates = self.registry.candidates(&params);
        if candidates.is_empty() {
            debug!("no backend matched query [{params}]");
            return Ok(RouteOutcome::default());
        }
        debug!("routing query [{params}] to {} backends", candidates.len());

        let params = &params;
        let searches = candidates.iter().map(|backend| {
            let backend = Arc::clone(backend);
            async move {
                let found = backend.search(params).await;
                (backend, found)
            }
        });
        let outcomes = futures::future::join_all(searches).await;

        let mut merged = RouteOutcome::default();
        let mut succeeded = 0usize;
        for (backend, found) in outcomes {
            match found {
                Ok(found) => {
                    succeeded += 1;
                    merged.results.append(found);
                }
                Err(error) => {
                    warn!("backend {} search failed: {error}", backend.label());
                    merged.failures.push(BackendFailure {
                        backend: backend.label(),
                        error,
                    });
                }
            }
        }

        if succeeded == 0 {
            return Err(RouteError::AllBackendsFailed {
                failures: merged.failures,
            });
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, LogBackend, RegisteredBackend};
    use crate::error::Result;
    use crate::result::LogResult;
    use crate::route::RouteRule;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct StaticBackend(SearchResults);

    #[async_trait]
    impl LogBackend for StaticBackend {
        async fn search(&self, _params: &SearchParams) -> Result<SearchResults> {
            Ok(self.0.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl LogBackend for FailingBackend {
        async fn search(&self, _params: &SearchParams) -> Result<SearchResults> {
            Err(SearchError::Transport("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingBackend {
        seen: Mutex<Vec<SearchParams>>,
    }

    #[async_trait]
    impl LogBackend for RecordingBackend {
        async fn search(&self, params: &SearchParams) -> Result<SearchResults> {
            self.seen.lock().push(params.clone());
            Ok(SearchResults::default())
        }
    }

    fn open_routes() -> Vec<RouteRule> {
        vec![RouteRule::default()]
    }

    fn registered(hash: &str, api: Arc<dyn LogBackend>) -> Arc<RegisteredBackend> {
        Arc::new(RegisteredBackend::new(
            BackendKind::File,
            hash.to_string(),
            open_routes(),
            api,
        ))
    }

    fn results(messages: &[&str], next_page: &str) -> SearchResults {
        SearchResults {
            total: messages.len(),
            results: messages
                .iter()
                .map(|m| LogResult {
                    message: m.to_string(),
                    ..Default::default()
                })
                .collect(),
            next_page: next_page.to_string(),
        }
    }

    fn router(backends: Vec<Arc<RegisteredBackend>>) -> QueryRouter {
        let registry = Arc::new(BackendRegistry::new());
        registry.register_all(backends);
        QueryRouter::new(registry)
    }

    #[tokio::test]
    async fn test_route_merges_in_candidate_order() {
        let router = router(vec![
            registered("a", Arc::new(StaticBackend(results(&["a1", "a2"], "cursor-a")))),
            registered("b", Arc::new(StaticBackend(results(&["b1"], "")))),
        ]);

        let outcome = router.route(SearchParams::default()).await.unwrap();
        let messages: Vec<_> = outcome
            .results
            .results
            .iter()
            .map(|r| r.message.as_str())
            .collect();

        assert_eq!(messages, vec!["a1", "a2", "b1"]);
        assert_eq!(outcome.results.total, 3);
        // The second backend's empty cursor does not clobber the first's.
        assert_eq!(outcome.results.next_page, "cursor-a");
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_route_partial_failure_is_not_fatal() {
        let router = router(vec![
            registered("ok", Arc::new(StaticBackend(results(&["kept"], "")))),
            registered("down", Arc::new(FailingBackend)),
        ]);

        let outcome = router.route(SearchParams::default()).await.unwrap();

        assert_eq!(outcome.results.results.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].backend, "file/down");
        assert!(matches!(outcome.failures[0].error, SearchError::Transport(_)));
    }

    #[tokio::test]
    async fn test_route_total_failure_is_an_error() {
        let router = router(vec![
            registered("down1", Arc::new(FailingBackend)),
            registered("down2", Arc::new(FailingBackend)),
        ]);

        let err = router.route(SearchParams::default()).await.unwrap_err();
        let RouteError::AllBackendsFailed { failures } = err;
        assert_eq!(failures.len(), 2);
    }

    #[tokio::test]
    async fn test_route_without_candidates_is_empty_success() {
        let registry = Arc::new(BackendRegistry::new());
        let router = QueryRouter::new(registry);

        let outcome = router.route(SearchParams::default()).await.unwrap();
        assert_eq!(outcome.results.total, 0);
        assert!(outcome.results.results.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_route_applies_defaults_before_dispatch() {
        let recording = Arc::new(RecordingBackend::default());
        let router = router(vec![registered("rec", recording.clone())]);

        router.route(SearchParams::default()).await.unwrap();

        let seen = recording.seen.lock();
        assert_eq!(seen[0].limit, 50);
        assert_eq!(seen[0].start, "1h");
        assert_eq!(seen[0].limit_per_item, 100);
    }

    #[tokio::test]
    async fn test_route_respects_routing_rules() {
        let pods = Arc::new(RecordingBackend::default());
        let vms = Arc::new(RecordingBackend::default());
        let registry = Arc::new(BackendRegistry::new());
        registry.register(Arc::new(RegisteredBackend::new(
            BackendKind::Kubernetes,
            "pods".to_string(),
            vec![RouteRule {
                kind: "KubernetesPod".to_string(),
                ..Default::default()
            }],
            pods.clone(),
        )));
        registry.register(Arc::new(RegisteredBackend::new(
            BackendKind::File,
            "vms".to_string(),
            vec![RouteRule {
                kind: "VM".to_string(),
                ..Default::default()
            }],
            vms.clone(),
        )));
        let router = QueryRouter::new(registry);

        let params = SearchParams {
            kind: "KubernetesPod".to_string(),
            ..Default::default()
        };
        router.route(params).await.unwrap();

        assert_eq!(pods.seen.lock().len(), 1);
        assert!(vms.seen.lock().is_empty());
    }
}
