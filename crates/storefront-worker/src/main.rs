//! Storefront Offline Worker - offline-first caching proxy
//!
//! Installs the storefront's app shell into a versioned cache, purges older
//! cache generations on activation, then serves the storefront through the
//! worker's caching strategies.

use request_cache::CacheStorage;
use std::sync::Arc;
use std::time::Duration;
use storefront_worker::server::{start_server, ServerState, SharedState};
use storefront_worker::{Config, HttpNetwork, Network, Result, StorefrontWorker, WorkerError};
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter =
        EnvFilter::from_default_env().add_directive("storefront_worker=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Storefront Offline Worker...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("Origin: {}", config.origin_url);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Cache version: {}", config.cache_version);
    info!("Mode: {:?}", config.mode);

    let storage = Arc::new(CacheStorage::new(
        config.cache_dir.clone(),
        config.max_cache_size,
        config.memory_cache_size,
    ));
    storage.init().await?;

    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(Duration::from_secs(
        config.request_timeout_secs,
    ))?);

    let port = config.port;
    let origin = config.origin_url.clone();
    let worker = StorefrontWorker::new(config, storage, network.clone());

    // A failed install leaves the worker redundant; requests still pass through
    if let Err(e) = worker.start().await {
        error!(error = %e, "Worker did not take control, serving pass-through only");
    }

    let state: SharedState = Arc::new(ServerState::new(worker, network, origin));

    // Start HTTP server (blocking)
    start_server(state, port)
        .await
        .map_err(|e| WorkerError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
