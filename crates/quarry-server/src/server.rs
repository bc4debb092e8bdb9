//! Service wiring and lifecycle.

use crate::config::ServerConfig;
use crate::probes::{DatabaseProbe, NatsProbe};
use anyhow::Context;
use quarry_api::{AppState, create_router};
use quarry_db::Database;
use quarry_nats::NatsQueuePublisher;
use quarry_remote::BitbucketServerGateway;
use quarry_trigger::TriggerPipeline;
use quarry_yaml::YamlConfigParser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

pub async fn connect_database(config: &ServerConfig) -> anyhow::Result<Database> {
    info!(max_connections = config.database.max_connections, "Connecting to database");
    Database::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to database")
}

/// Connect every collaborator, serve until SIGINT or SIGTERM, then drain
/// the queue connection.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let database = connect_database(&config).await?;
    if config.database.migrate {
        database.migrate().await.context("Failed to run migrations")?;
    }

    let queue = Arc::new(
        NatsQueuePublisher::connect_with_config(config.nats.clone())
            .await
            .context("Failed to connect to NATS")?,
    );
    let remote = Arc::new(
        BitbucketServerGateway::new(config.remote.clone())
            .context("Failed to build Bitbucket client")?,
    );

    let pipeline = Arc::new(TriggerPipeline::new(
        Arc::new(database.store()),
        remote,
        Arc::new(YamlConfigParser::new()),
        queue.clone(),
        config.pipeline.clone(),
    ));

    let mut state = AppState::new(pipeline)
        .with_probe(Arc::new(DatabaseProbe(database.clone())))
        .with_probe(Arc::new(NatsProbe(queue.clone())));
    match &config.http.public_url {
        Some(url) => state = state.with_public_url(url.as_str()),
        None => warn!("No public URL configured; links will be derived from request headers"),
    }

    let app = create_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.http.bind))?;
    info!(addr = %listener.local_addr()?, "Quarry listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    queue.shutdown().await.context("Failed to drain NATS")?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
