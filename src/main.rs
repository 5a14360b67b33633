//! peercache - A distributed read-through cache node
//!
//! Serves one group over HTTP and cooperates with the peers listed in `PEERS`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peercache::api::{create_router, AppState};
use peercache::loader::{Loader, SeedLoader};
use peercache::{Config, GroupRegistry, HttpPool};

/// Main entry point for a cache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Register the group with its seed loader
/// 4. Build the peer pool and bind it to the group
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peercache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting peercache node");

    let config = Config::from_env();
    info!(
        "Configuration loaded: self={}, peers={:?}, group={}, cache_bytes={}, replicas={}, port={}",
        config.self_addr,
        config.peers,
        config.group_name,
        config.cache_bytes,
        config.replicas,
        config.server_port
    );

    let loader = match &config.seed_file {
        Some(path) => SeedLoader::from_file(path)?,
        None => SeedLoader::sample(),
    };
    if loader.is_empty() {
        warn!("Seed data is empty, every lookup will fail");
    } else {
        info!("Seed loader ready with {} keys", loader.len());
    }
    let loader: Arc<dyn Loader> = Arc::new(loader);

    let registry = Arc::new(GroupRegistry::new());
    let group = registry.new_group(config.group_name.clone(), config.cache_bytes, loader);
    info!("Serving groups {:?}", registry.names());

    let pool = Arc::new(HttpPool::new(config.self_addr.clone()).with_replicas(config.replicas));
    pool.set(config.peers.iter().cloned());
    group.register_peers(pool.clone())?;

    let app = create_router(AppState::new(registry, pool));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Node listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Node shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
