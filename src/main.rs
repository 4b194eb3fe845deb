mod birthday_service;
mod bookmarks;
mod config;
mod error;
mod object_storage;
mod photo_service;
mod record_store;
mod web;

use anyhow::{Context, Result};
use birthday_service::BirthdayService;
use config::Config;
use object_storage::ObjectStorage;
use photo_service::PhotoService;
use record_store::RecordStore;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging (console + rolling file)
    let _log_guard = init_tracing(&config.service.log_level, &config.service.log_dir);

    info!(
        service = %config.service.name,
        "Starting photo-journal service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Initialize record store
    let store = RecordStore::connect(&config.database)
        .await
        .context("Failed to initialize record store")?;

    // Run migrations if enabled
    if config.database.run_migrations {
        store
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    // Initialize object storage
    let storage = Arc::new(ObjectStorage::new(&config.s3, config.presigned_url_expiry()).await);

    // Wire services
    let photos = PhotoService::new(storage.clone(), Arc::new(store.photos()));
    let birthdays = BirthdayService::new(
        storage,
        Arc::new(store.birthdays()),
        config.birthday.clone(),
    );

    let state = AppState {
        photos,
        birthdays,
        store,
    };

    // Spawn web server task
    let http_config = config.http.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = web::start_server(state, &http_config).await {
            error!(error = %e, "Web server error");
        }
    });

    info!("Photo-journal service started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down photo-journal service");

    server_handle.abort();

    info!("Photo-journal service stopped");

    Ok(())
}

/// Initialize tracing/logging: console output plus a daily-rolling log file
fn init_tracing(log_level: &str, log_dir: &str) -> WorkerGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let file_appender = tracing_appender::rolling::daily(log_dir, "memoir.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    guard
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
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
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
