//! HTTP server lifecycle
//!
//! Binds the listener, serves the API router and drains in-flight requests
//! on shutdown:
//! - SIGTERM: graceful shutdown
//! - SIGINT: graceful shutdown (Ctrl+C)

use crate::api::{self, AppState};
use crate::metrics::Metrics;
use crate::store::Store;
use axum::Router;
use std::future::Future;
use std::io;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Serve the API on `bind` until SIGTERM or SIGINT.
pub async fn run(store: Store, bind: &str) -> anyhow::Result<()> {
    let metrics = Metrics::new()?;
    let app = api::router(AppState::new(store, metrics));

    // Install handlers before accepting connections so an early signal is not lost
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {e}"))?;

    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "itrack API listening");

    serve(listener, app, async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
    })
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Serve `app` on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
