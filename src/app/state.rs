//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use std::sync::Arc;

use crate::domain::{CredentialVerifier, ItemRepository, ObjectStorage, UserRepository};
use crate::infra::observability::PrometheusHandle;

use super::service::{AppService, ServiceSettings};

/// Shared application state for the Axum web server.
///
/// Everything in here is built once at start-up and only read afterwards.
///
/// # Example
///
/// ```ignore
/// let mongo = Arc::new(MongoRepository::connect(&uri, "mavsmart").await?);
/// let storage = Arc::new(ObjectStoreStorage::local("./uploads", "/uploads")?);
/// let verifier = Arc::new(FirebaseTokenVerifier::new("my-project")?);
/// let state = AppState::new(mongo.clone(), mongo, storage, verifier);
///
/// let router = create_router(Arc::new(state));
/// ```
#[derive(Clone)]
pub struct AppState {
    /// The application service containing business logic.
    pub service: Arc<AppService>,

    /// Verifier for bearer credentials on protected routes.
    pub verifier: Arc<dyn CredentialVerifier>,

    /// Prometheus handle backing `GET /metrics`, when metrics are enabled.
    pub metrics: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates a new `AppState` with default service settings.
    #[must_use]
    pub fn new(
        items: Arc<dyn ItemRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn ObjectStorage>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self::with_settings(items, users, storage, verifier, ServiceSettings::default())
    }

    /// Creates a new `AppState` with explicit service settings.
    #[must_use]
    pub fn with_settings(
        items: Arc<dyn ItemRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn ObjectStorage>,
        verifier: Arc<dyn CredentialVerifier>,
        settings: ServiceSettings,
    ) -> Self {
        let service = Arc::new(AppService::with_settings(items, users, storage, settings));
        Self::with_service(service, verifier)
    }

    /// Creates a new `AppState` around a pre-built service.
    #[must_use]
    pub fn with_service(service: Arc<AppService>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            service,
            verifier,
            metrics: None,
        }
    }

    /// Attaches a Prometheus handle for the metrics endpoint.
    #[must_use]
    pub fn with_metrics(mut self, handle: Arc<PrometheusHandle>) -> Self {
        self.metrics = Some(handle);
        self
    }
}
