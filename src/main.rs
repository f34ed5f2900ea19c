use photostore_api_rest::{router, AppState};
use photostore_core::{
    config::max_upload_bytes_from_env_value, CoreConfig, IngestService, DEFAULT_DATABASE_PATH,
    DEFAULT_REST_ADDR, DEFAULT_UPLOAD_DIR,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the photostore server
///
/// Bootstraps the upload directory and catalog, then serves the REST API until interrupted.
///
/// # Environment Variables
/// - `PHOTOSTORE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `UPLOAD_DIR`: Directory uploaded files are stored in (default: "uploads")
/// - `DATABASE_PATH`: SQLite catalog file (default: "photo_sync.db")
/// - `MAX_UPLOAD_BYTES`: Largest accepted upload in bytes (default: 1 GiB)
///
/// # Errors
/// Returns an error if:
/// - the configuration is invalid,
/// - the upload directory or catalog cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("photostore_run=info".parse()?)
                .add_directive("photostore_core=info".parse()?)
                .add_directive("photostore_api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("PHOTOSTORE_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.into());
    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.into());
    let max_upload_bytes = max_upload_bytes_from_env_value(std::env::var("MAX_UPLOAD_BYTES").ok())?;

    let cfg = CoreConfig::new(
        PathBuf::from(upload_dir),
        PathBuf::from(database_path),
        max_upload_bytes,
    )?;
    let ingest = IngestService::from_config(&cfg)?;

    let app = router(AppState::new(ingest));

    tracing::info!("++ Starting photostore REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- photostore REST stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {:?}", e);
        std::future::pending::<()>().await;
    }
}
