//! Tavern gateway binary.
//!
//! Loads `tavern-config.yaml` (or `TAVERN_CONFIG`), initializes tracing and
//! serves the realtime lobby protocol until `Ctrl-C`.

use anyhow::Context;
use tavern_server::ServerSettings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = ServerSettings::load().context("loading configuration")?;

    init_tracing(&settings);

    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        backend = ?settings.storage.backend,
        "Tavern gateway starting"
    );

    tavern_server::run(&settings)
        .await
        .context("running gateway")?;

    Ok(())
}

fn init_tracing(settings: &ServerSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    if settings.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
