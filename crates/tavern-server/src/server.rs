//! Gateway HTTP server lifecycle.
//!
//! [`start_server`] binds the listener and serves until `Ctrl-C`.

use std::net::SocketAddr;
use std::sync::Arc;

use tavern_db::Store;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::HttpSettings;
use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Parse `host:port` into a socket address.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the pair is not a valid address.
pub fn listen_addr(settings: &HttpSettings) -> Result<SocketAddr, ServerError> {
    format!("{}:{}", settings.host, settings.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))
}

/// Bind and serve until `Ctrl-C`, then stop accepting connections and
/// return.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server hits a
/// fatal I/O error.
pub async fn start_server<S: Store>(
    settings: &HttpSettings,
    state: Arc<AppState<S>>,
) -> Result<(), ServerError> {
    let addr = listen_addr(settings)?;
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "Tavern gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("Tavern gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
