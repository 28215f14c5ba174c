use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bike_server::cache::ResultCache;
use bike_server::config::{AppConfig, ConfigError, DocumentBackendConfig};
use bike_server::feed::{FeedHandle, FeedMutator, MutatorConfig};
use bike_server::service::{ServiceError, StationService};
use bike_server::store::document::HttpDocumentDatabase;
use bike_server::store::{DocumentStore, SnapshotStore, StationStore, StoreError};

/// Failure that stops the process before it can serve.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("station store: {0}")]
    Store(#[from] StoreError),

    #[error("station service: {0}")]
    Service(#[from] ServiceError),

    #[error("waiting for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Bike server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    let cache = Arc::new(ResultCache::new(&config.cache));

    // The snapshot store cannot serve without its dataset.
    let snapshot = Arc::new(SnapshotStore::load(&config.seed_path)?);
    let snapshot_service = StationService::new(snapshot, cache.clone());
    log_summary(&snapshot_service).await?;

    let mut feeds = vec![FeedMutator::new(snapshot_service, config.mutator.clone()).spawn()];

    if let Some(document) = config.document {
        match start_document_backend(document, cache.clone(), &config.mutator).await {
            Ok(handle) => feeds.push(handle),
            Err(e) => warn!(error = %e, "Document backend unavailable, serving snapshot only"),
        }
    }

    info!(feeds = feeds.len(), "Bike server running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    for feed in feeds {
        feed.shutdown().await;
    }
    Ok(())
}

async fn start_document_backend(
    config: DocumentBackendConfig,
    cache: Arc<ResultCache>,
    mutator: &MutatorConfig,
) -> Result<FeedHandle, StartupError> {
    let db = HttpDocumentDatabase::new(config.cosmos).map_err(StoreError::from)?;
    let store = Arc::new(DocumentStore::new(db, config.store));
    store.initialize().await?;

    let service = StationService::new(store, cache);
    log_summary(&service).await?;

    Ok(FeedMutator::new(service, mutator.clone()).spawn())
}

async fn log_summary<S: StationStore>(service: &StationService<S>) -> Result<(), ServiceError> {
    let summary = service.summary().await?;
    info!(
        backend = %S::BACKEND,
        stations = summary.total_stations,
        bike_stands = summary.total_bike_stands,
        available_bikes = summary.total_available_bikes,
        statuses = ?summary.counts_by_status,
        "Station backend ready"
    );
    Ok(())
}
