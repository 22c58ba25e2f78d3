use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamgate_core::{
    create_indexers, load_config, validate_config, CachePersistence, CacheSet, DebridProvider,
    IndexerAdapter, RealDebridProvider,
};
use streamgate_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("STREAMGATE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!(public_url = %config.server.public_url, "Configuration loaded successfully");

    // Restore caches
    let snapshot_dir = config.cache.snapshot_dir();
    info!("Restoring caches from {:?}", snapshot_dir);
    let caches = CacheSet::load(&config.cache, &snapshot_dir).await;
    let persistence = Arc::new(CachePersistence::new(&snapshot_dir, caches.persistent()));
    persistence.log_stats().await;

    // Outbound clients
    let provider: Arc<dyn DebridProvider> = Arc::new(
        RealDebridProvider::new(&config.debrid).context("Failed to create debrid client")?,
    );
    let adapters = create_indexers(&config.search).context("Failed to create indexers")?;
    info!(
        provider = provider.name(),
        indexers = ?adapters.iter().map(|a| a.name().to_string()).collect::<Vec<_>>(),
        "Search and debrid clients initialized"
    );

    let persist_task =
        persistence.spawn_periodic(Duration::from_secs(config.cache.persist_interval_secs));
    let stats_task =
        persistence.spawn_stats_logger(Duration::from_secs(config.cache.stats_interval_secs));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, caches, provider, adapters));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    persist_task.abort();
    stats_task.abort();
    persistence.shutdown().await;
    info!("Caches persisted");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
