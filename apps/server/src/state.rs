//! Shared application state

use crate::{
    config::{BackendKind, Config},
    services::{BundleProcessor, CapabilityService, DocumentService, ResponseSynthesizer},
    store::{HttpResourceStore, InMemoryResourceStore, PersistenceGateway},
    Result,
};
use std::{sync::Arc, time::Duration};

/// Shared application state passed to all handlers
///
/// Holds no per-request data; each request works on its own bundle copy.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn PersistenceGateway>,
    pub processor: Arc<BundleProcessor>,
    pub synthesizer: ResponseSynthesizer,
    pub documents: Arc<DocumentService>,
    pub capability: Arc<CapabilityService>,
}

impl AppState {
    /// Build state with the backend named by `backend.kind`.
    pub fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn PersistenceGateway> = match config.backend.kind {
            BackendKind::Memory => {
                tracing::warn!("Using the in-memory backend; stored resources are lost on restart");
                Arc::new(InMemoryResourceStore::new())
            }
            BackendKind::Http => {
                let url = config.backend.url.as_deref().ok_or_else(|| {
                    crate::Error::Internal("backend.url must be set when backend.kind=http".to_string())
                })?;
                tracing::info!(backend_url = %url, "Using FHIR REST backend");
                Arc::new(HttpResourceStore::new(
                    url,
                    Duration::from_secs(config.backend.timeout_seconds),
                )?)
            }
        };

        Self::with_store(config, store)
    }

    /// Build state around an existing store (tests inject their own).
    pub fn with_store(config: Config, store: Arc<dyn PersistenceGateway>) -> Result<Self> {
        crate::metrics::register_metrics();

        let processor = BundleProcessor::from_config(store.clone(), &config)?;
        let synthesizer = ResponseSynthesizer::new(config.processing.failure_policy);
        let documents = DocumentService::new(store.clone(), config.external_base_url());
        let capability = CapabilityService::new(&config);

        Ok(Self {
            config: Arc::new(config),
            store,
            processor: Arc::new(processor),
            synthesizer,
            documents: Arc::new(documents),
            capability: Arc::new(capability),
        })
    }
}
