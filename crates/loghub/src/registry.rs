use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::backend::RegisteredBackend;
use crate::params::SearchParams;

/// The process-wide set of active backends, shared between query dispatch
/// and reconciliation.
///
/// Construct one instance and pass it around; reads (candidate selection)
/// and writes (reconciliation) are mutually exclusive through the inner
/// lock. Entries are immutable once registered: configuration changes
/// replace entries, never edit them.
#[derive(Default)]
pub struct BackendRegistry {
    backends: RwLock<Vec<Arc<RegisteredBackend>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a backend. No de-duplication: registering the same
    /// configuration twice is legal and redundant, and both entries leave
    /// together on deregistration.
    pub fn register(&self, backend: Arc<RegisteredBackend>) {
        info!("registering backend {}", backend.label());
        self.backends.write().push(backend);
    }

    pub fn register_all(&self, backends: impl IntoIterator<Item = Arc<RegisteredBackend>>) {
        for backend in backends {
            self.register(backend);
        }
    }

    /// Remove every entry whose content hash matches one of the deleted
    /// registrations. Hash-keyed, not identity-keyed: duplicates of the
    /// same configuration are all removed.
    pub fn deregister(&self, deleted: &[Arc<RegisteredBackend>]) {
        let mut backends = self.backends.write();
        let before = backends.len();

        backends.retain(|current| {
            let gone = deleted.iter().any(|d| d.hash() == current.hash());
            if gone {
                info!("deregistering backend {}", current.label());
            }
            !gone
        });

        if backends.len() == before {
            debug!("deregistration matched no registered backend");
        }
    }

    /// Converge toward a desired set: drop every entry whose content hash
    /// appears nowhere in `desired`. Entries present in `desired` but not
    /// yet registered are left for the caller to register.
    pub fn retain_desired(&self, desired: &[Arc<RegisteredBackend>]) {
        self.backends.write().retain(|current| {
            let keep = desired.iter().any(|d| d.hash() == current.hash());
            if !keep {
                info!("removing backend {} absent from desired state", current.label());
            }
            keep
        });
    }

    /// Converge the registry to exactly the desired set: entries whose
    /// hash is absent from `desired` are removed, and desired
    /// registrations with no currently registered hash are added.
    pub fn reconcile(&self, desired: Vec<Arc<RegisteredBackend>>) {
        let mut backends = self.backends.write();

        backends.retain(|current| {
            let keep = desired.iter().any(|d| d.hash() == current.hash());
            if !keep {
                info!("removing backend {} absent from desired state", current.label());
            }
            keep
        });

        for backend in desired {
            if !backends.iter().any(|b| b.hash() == backend.hash()) {
                info!("registering backend {}", backend.label());
                backends.push(backend);
            }
        }
    }

    /// Every registered backend whose routes match the query, in
    /// registration order. Additive matches widen the set; they never
    /// exclude other matching backends.
    pub fn candidates(&self, params: &SearchParams) -> Vec<Arc<RegisteredBackend>> {
        self.backends
            .read()
            .iter()
            .filter(|backend| backend.match_route(params).0)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.read().is_empty()
    }
}
