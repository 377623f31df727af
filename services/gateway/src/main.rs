use std::sync::Arc;

use anyhow::Context;
use gateway::catalog::{Catalog, InMemoryCatalog};
use gateway::config::GatewayConfig;
use gateway::{create_router, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Optional local overrides; absence is not an error.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();
    tracing::info!("Starting Gateway API service");

    let config = GatewayConfig::from_env().context("invalid gateway configuration")?;

    let catalog: Arc<dyn Catalog> = match &config.catalog_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading catalog seed");
            Arc::new(InMemoryCatalog::load(path).context("failed to load catalog")?)
        }
        None => {
            tracing::info!("No catalog file configured, using demo catalog");
            Arc::new(InMemoryCatalog::demo())
        }
    };

    let addr = config.bind_addr;
    let state = AppState::new(config, catalog);
    let app = create_router(state.clone());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on Ctrl-C or SIGTERM, then ends every display session so the
/// server can drain.
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
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

    let closed = state.registry().close_all();
    tracing::info!(displays = closed, "Shutdown signal received, closing displays");
}
