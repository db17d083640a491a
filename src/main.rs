// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::channel_writer::ChannelWriter;
use crate::application::dispatcher::FanOutDispatcher;
use crate::application::scheduler::{IngestionScheduler, IngestionStats};
use crate::domain::timestamp::TimestampNormalizer;
use crate::infrastructure::config::{
    load_devices_config, load_influx_config, load_ingest_config, StorageBackend,
};
use crate::infrastructure::device_directory::ConfigDeviceDirectory;
use crate::infrastructure::influx_repository::InfluxRepository;
use crate::infrastructure::memory_repository::InMemorySampleStore;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{health_check, ingestion_stats, submit_report};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let ingest_config = load_ingest_config()?;
    let devices_config = load_devices_config()?;

    // Create adapters (infrastructure layer)
    let directory = ConfigDeviceDirectory::from_config(&devices_config);
    tracing::info!(devices = directory.len(), "device directory loaded");

    let writer: Arc<dyn ChannelWriter> = match ingest_config.storage.backend {
        StorageBackend::Influx => {
            let influx_config = load_influx_config()?;
            let influx = influx_config.influx;
            Arc::new(InfluxRepository::new(
                influx.host,
                influx.token,
                influx.database,
                influx.retention_policy,
                Duration::from_secs(influx.request_timeout_secs),
            )?)
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory sample storage, samples are lost on restart");
            Arc::new(InMemorySampleStore::new())
        }
    };

    // Create ingestion pipeline (application layer)
    let normalizer = TimestampNormalizer::new(ingest_config.ingest.station_utc_offset_minutes)?;
    let dispatcher = Arc::new(FanOutDispatcher::new(
        Arc::new(directory),
        writer,
        normalizer,
    ));
    let (scheduler, workers) = IngestionScheduler::start(
        dispatcher,
        &ingest_config.scheduler,
        Arc::new(IngestionStats::default()),
    );

    let state = Arc::new(AppState { scheduler });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/report", post(submit_report))
        .route("/stats", get(ingestion_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = ingest_config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", ingest_config.server.bind_addr))?;
    tracing::info!(%addr, "Starting field-station ingest service");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last scheduler handle; drain what is still queued.
    workers.join().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Error setting up signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Error setting up SIGTERM handler: {}", e);
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

    tracing::info!("Received shutdown signal");
}
