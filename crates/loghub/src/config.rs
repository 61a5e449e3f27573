use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use crate::backend::{
    BackendKind, ElasticBackend, FileBackend, HttpStoreTransport, KubernetesBackend, LogBackend,
    OpenSearchBackend, PodLogSource, RegisteredBackend,
};
use crate::error::SearchError;
use crate::hash::content_hash;
use crate::route::RouteRule;

/// Declarative backend configuration document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Path of the config file this document was loaded from.
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(default)]
    pub backends: Vec<BackendSpec>,
}

/// One configured backend entry. Exactly one kind section is expected;
/// entries carrying several are built once per section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<StoreConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opensearch: Option<StoreConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Namespace to search; empty means the client's default.
    pub namespace: String,
    pub routes: Vec<RouteRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    /// Static labels attached to every record from these files.
    pub labels: BTreeMap<String, String>,
    pub paths: Vec<String>,
    pub routes: Vec<RouteRule>,
}

/// Connection config shared by the structured-log-store backends.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub address: String,
    /// Query body template, rendered per request.
    pub query: String,
    pub index: String,
    pub fields: FieldMapping,
    pub routes: Vec<RouteRule>,
}

/// Field names used to pull the canonical record out of a source
/// document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldMapping {
    pub timestamp: String,
    pub message: String,
    /// Field-name patterns. The untyped store variant excludes matching
    /// keys from the emitted labels; the typed variant drops records whose
    /// matching fields repeat the message.
    pub exclusions: Vec<String>,
    /// Source fields promoted to labels verbatim (typed store variant).
    pub labels: Vec<String>,
}

/// A backend that could not be constructed. Reported alongside the built
/// ones so one bad entry never takes the rest down.
#[derive(Debug)]
pub struct BuildFailure {
    pub kind: BackendKind,
    pub error: SearchError,
}

/// Outcome of constructing adapters from a config document.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub backends: Vec<Arc<RegisteredBackend>>,
    pub failures: Vec<BuildFailure>,
}

impl SearchConfig {
    /// Load a config document from disk. Relative file paths inside the
    /// document are resolved against the config file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let mut config = Self::parse(&data)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.path = path.to_path_buf();
        config.resolve_paths();
        Ok(config)
    }

    /// Parse a config document without touching the filesystem.
    pub fn parse(data: &str) -> Result<Self> {
        serde_yaml::from_str(data).context("invalid backend configuration document")
    }

    fn resolve_paths(&mut self) {
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        for spec in &mut self.backends {
            if let Some(file) = &mut spec.file {
                for path in &mut file.paths {
                    if !Path::new(path).is_absolute() {
                        *path = base.join(&path).display().to_string();
                    }
                }
            }
        }
    }

    /// Construct the configured backend adapters. A backend that fails
    /// construction is reported and skipped; the remaining backends are
    /// built regardless.
    ///
    /// `pods` is the externally supplied orchestrator log-fetch handle,
    /// required only when the document configures a kubernetes backend.
    pub fn build(&self, pods: Option<Arc<dyn PodLogSource>>) -> BuildOutcome {
        let mut outcome = BuildOutcome::default();

        for spec in &self.backends {
            if let Some(cfg) = &spec.kubernetes {
                let built = match &pods {
                    Some(pods) => registration(
                        BackendKind::Kubernetes,
                        &json!({"kubernetes": cfg}),
                        cfg.routes.clone(),
                        Ok(Arc::new(KubernetesBackend::new(
                            cfg.namespace.clone(),
                            Arc::clone(pods),
                        ))),
                    ),
                    None => Err(SearchError::Config(
                        "kubernetes backend configured without a log-fetch client".to_string(),
                    )),
                };
                outcome.push(BackendKind::Kubernetes, built);
            }

            if let Some(cfg) = &spec.file {
                let built = registration(
                    BackendKind::File,
                    &json!({"file": cfg}),
                    cfg.routes.clone(),
                    Ok(Arc::new(FileBackend::new(cfg.clone()))),
                );
                outcome.push(BackendKind::File, built);
            }

            if let Some(cfg) = &spec.elasticsearch {
                let built = registration(
                    BackendKind::Elasticsearch,
                    &json!({"elasticsearch": cfg}),
                    cfg.routes.clone(),
                    HttpStoreTransport::new(&cfg.address)
                        .and_then(|transport| ElasticBackend::new(cfg, Arc::new(transport)))
                        .map(Arc::new),
                );
                outcome.push(BackendKind::Elasticsearch, built);
            }

            if let Some(cfg) = &spec.opensearch {
                let built = registration(
                    BackendKind::Opensearch,
                    &json!({"opensearch": cfg}),
                    cfg.routes.clone(),
                    HttpStoreTransport::new(&cfg.address)
                        .and_then(|transport| OpenSearchBackend::new(cfg, Arc::new(transport)))
                        .map(Arc::new),
                );
                outcome.push(BackendKind::Opensearch, built);
            }

            if spec.kubernetes.is_none()
                && spec.file.is_none()
                && spec.elasticsearch.is_none()
                && spec.opensearch.is_none()
            {
                debug!("skipping backend entry with no kind section");
            }
        }

        outcome
    }
}

fn registration<T: LogBackend + 'static>(
    kind: BackendKind,
    hashed: &serde_json::Value,
    routes: Vec<RouteRule>,
    api: std::result::Result<Arc<T>, SearchError>,
) -> std::result::Result<RegisteredBackend, SearchError> {
    let api = api?;
    let hash = content_hash(hashed)?;
    Ok(RegisteredBackend::new(kind, hash, routes, api))
}

impl BuildOutcome {
    fn push(&mut self, kind: BackendKind, built: std::result::Result<RegisteredBackend, SearchError>) {
        match built {
            Ok(backend) => {
                info!("configured backend {}", backend.label());
                self.backends.push(Arc::new(backend));
            }
            Err(err) => {
                error!("failed to configure {kind} backend: {err}");
                self.failures.push(BuildFailure { kind, error: err });
            }
        }
    }
}
