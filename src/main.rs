use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tracing::{info, warn};

use mavsmart_api::api::create_router_with_options;
use mavsmart_api::app::{AppState, ServiceSettings};
use mavsmart_api::config::{AppConfig, AuthConfig, StorageConfig};
use mavsmart_api::domain::{CredentialVerifier, ObjectStorage};
use mavsmart_api::infra::observability::{init_metrics_handle, init_tracing};
use mavsmart_api::infra::{
    FirebaseTokenVerifier, MongoRepository, ObjectStoreStorage, StaticTokenVerifier,
};

fn build_storage(config: &AppConfig) -> Result<Arc<dyn ObjectStorage>> {
    let storage = match &config.storage {
        StorageConfig::S3 { bucket } => {
            ObjectStoreStorage::s3(bucket, config.photo_public_base_url.clone())?
        }
        StorageConfig::Local { dir } => {
            ObjectStoreStorage::local(dir, config.photo_public_base_url.clone())?
        }
    };
    info!(backend = storage.backend(), "Photo storage ready");
    Ok(Arc::new(storage))
}

fn build_verifier(config: &AppConfig) -> Result<Arc<dyn CredentialVerifier>> {
    let verifier: Arc<dyn CredentialVerifier> = match &config.auth {
        AuthConfig::Firebase {
            project_id,
            keys_ttl,
        } => {
            info!(project_id = %project_id, "Verifying Firebase ID tokens");
            Arc::new(FirebaseTokenVerifier::new(project_id.clone())?.with_keys_ttl(*keys_ttl))
        }
        AuthConfig::Static { tokens } => {
            let verifier = StaticTokenVerifier::parse(tokens.expose_secret())?;
            warn!(
                tokens = verifier.len(),
                "Using static bearer tokens; do not run this in production"
            );
            Arc::new(verifier)
        }
    };
    Ok(verifier)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    let mongo = Arc::new(
        MongoRepository::connect(
            config.mongodb_uri.expose_secret(),
            &config.mongodb_database,
        )
        .await
        .context("failed to connect to MongoDB")?,
    );

    let storage = build_storage(&config)?;
    let verifier = build_verifier(&config)?;

    let settings = ServiceSettings {
        photo_policy: config.photo_policy.clone(),
        email_domain: config.email_domain.clone(),
    };
    let mut state = AppState::with_settings(mongo.clone(), mongo, storage, verifier, settings);

    if config.metrics_enabled {
        match init_metrics_handle() {
            Some(handle) => state = state.with_metrics(handle),
            None => warn!("Metrics recorder could not be installed; /metrics disabled"),
        }
    }

    let router = create_router_with_options(
        Arc::new(state),
        config.rate_limit.clone(),
        config.request_timeout,
    );

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Server starting");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}
