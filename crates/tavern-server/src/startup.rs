//! Wiring from [`ServerSettings`] to a running gateway.
//!
//! Picks the storage backend, builds the token verifier and serves until
//! shutdown. The binary calls [`run`] once logging is up.

use std::sync::Arc;

use tavern_db::{DbError, MemoryStore, PostgresConfig, PostgresPool, PostgresStore, Store};
use tavern_session::TokenResolver;
use tracing::{info, warn};

use crate::config::{ServerSettings, StorageBackend, StorageSettings};
use crate::server::{ServerError, start_server};
use crate::state::AppState;

/// Errors that can occur while bringing the gateway up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),

    /// The storage backend could not be reached or migrated.
    #[error("storage start error: {0}")]
    Storage(#[from] DbError),
}

/// Build state for `settings` on top of the configured backend and serve
/// until shutdown.
///
/// # Errors
///
/// Returns [`StartupError::Storage`] if `PostgreSQL` is selected and the
/// pool cannot connect or migrate, and [`StartupError::Server`] if the
/// listener cannot bind.
pub async fn run(settings: &ServerSettings) -> Result<(), StartupError> {
    if settings.auth.uses_dev_secret() {
        warn!("auth.jwt_secret is the development default; set JWT_SECRET in production");
    }
    let tokens = TokenResolver::new(settings.auth.jwt_secret.as_bytes());

    match settings.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; lobbies and maps are lost on restart");
            serve(settings, Arc::new(MemoryStore::new()), tokens).await
        }
        StorageBackend::Postgres => {
            let store = Arc::new(connect_postgres(&settings.storage).await?);
            let result = serve(settings, Arc::clone(&store), tokens).await;
            store.pool().close().await;
            result
        }
    }
}

/// Connect the pool and apply pending migrations.
///
/// # Errors
///
/// Returns [`DbError`] if the URL is invalid, the database is
/// unreachable within the connect timeout, or a migration fails.
pub async fn connect_postgres(storage: &StorageSettings) -> Result<PostgresStore, DbError> {
    let config = PostgresConfig::new(&storage.postgres_url)
        .with_max_connections(storage.max_connections)
        .with_connect_timeout(storage.connect_timeout());
    let pool = PostgresPool::connect(&config).await?;
    pool.run_migrations().await?;
    Ok(PostgresStore::new(pool))
}

async fn serve<S: Store>(
    settings: &ServerSettings,
    store: Arc<S>,
    tokens: TokenResolver,
) -> Result<(), StartupError> {
    let state = Arc::new(AppState::new(store, tokens));
    info!(backend = ?settings.storage.backend, "Gateway state ready");
    start_server(&settings.server, state).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_postgres_url_fails_fast() {
        let storage = StorageSettings {
            backend: StorageBackend::Postgres,
            postgres_url: "not a url".to_owned(),
            ..StorageSettings::default()
        };
        assert!(matches!(
            connect_postgres(&storage).await,
            Err(DbError::Config(_))
        ));
    }
}
