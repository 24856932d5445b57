use anyhow::{Context, Result};
use std::sync::Arc;
use story_service::api::{start_api_server, AppState};
use story_service::config::Config;
use story_service::media_upload::MediaUploadCoordinator;
use story_service::object_store;
use story_service::story_repository::StoryRepository;
use story_service::story_store::PgStoryStore;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting story service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // A store that cannot be reached at boot is fatal
    let store = PgStoryStore::connect(&config.database)
        .await
        .context("Failed to initialize story store")?;

    if config.database.run_migrations {
        store
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    let s3_client = object_store::connect(&config.s3)
        .await
        .context("Failed to initialize S3 client")?;

    if config.s3.create_bucket {
        object_store::ensure_bucket(&s3_client, &config.s3)
            .await
            .context("Failed to ensure media bucket")?;
    }

    let api_state = AppState {
        stories: Arc::new(StoryRepository::new(Arc::new(store))),
        uploads: Arc::new(MediaUploadCoordinator::new(
            s3_client,
            &config.s3,
            config.presigned_url_expiry(),
        )),
    };

    let api_config = config.api.clone();
    let mut api_handle = tokio::spawn(async move {
        if let Err(e) = start_api_server(api_state, &api_config).await {
            error!(error = %e, "API server error");
        }
    });

    info!("Story service started successfully");

    // Wait for shutdown signal, or the server giving up on its own
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutting down story service");
        }
        _ = &mut api_handle => {
            error!("API server exited unexpectedly");
        }
    }

    api_handle.abort();

    info!("Story service stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
