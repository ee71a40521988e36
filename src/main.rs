//! Terroir Cache - admin server
//!
//! Runs the cache manager with its disk sweep task behind the admin HTTP API.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use terroir_cache::api::create_router;
use terroir_cache::{spawn_sweep_task, AppState, Config};

/// Main entry point for the cache admin server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache manager over the memory and disk tiers
/// 4. Start background disk sweep task
/// 5. Optionally warm up the slow-changing categories
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "terroir_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Terroir Cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_dir={}, memory_max_entries={}, port={}, sweep_interval={}s",
        config.cache_dir.display(),
        config.memory_max_entries,
        config.server_port,
        config.sweep_interval
    );

    let state = AppState::from_config(&config);
    info!("Cache manager initialized");

    let sweep_handle = spawn_sweep_task(
        state.manager.clone(),
        Duration::from_secs(config.sweep_interval),
        Duration::from_secs(config.sweep_backoff),
    );
    info!("Background sweep task started");

    if config.warmup_on_start {
        let loaded = state.manager.warmup(None).await;
        info!("Startup warmup loaded {} entries", loaded);
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handle))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the sweep task.
async fn shutdown_signal(sweep_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
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

    sweep_handle.abort();
    warn!("Sweep task aborted");
}
