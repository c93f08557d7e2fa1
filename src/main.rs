use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use propdocs::{
    build_router,
    config::Config,
    db::Database,
    ocr::{OcrConfig, OcrPipeline},
    storage::factory::{create_blob_store, storage_config_from_env},
    AppState,
};

#[derive(Parser)]
#[command(name = "propdocs")]
#[command(about = "Property document storage and invoice OCR service")]
struct Args {
    /// Skip running embedded database migrations on startup
    #[arg(long)]
    skip_migrations: bool,

    /// Override SERVER_ADDRESS
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(bind) = args.bind {
        config.server_address = bind;
    }

    info!("Connecting to database...");
    let db = Database::new(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    if args.skip_migrations {
        info!("Skipping database migrations");
    } else {
        db.migrate().await.context("Failed to run database migrations")?;
        info!("Database migrations applied");
    }

    let blob_store = create_blob_store(storage_config_from_env(&config)?).await?;

    let ocr = Arc::new(OcrPipeline::from_config(&OcrConfig {
        temp_dir: PathBuf::from(&config.temp_dir),
        language: config.ocr_language.clone(),
        raster_dpi: config.ocr_raster_dpi,
    }));

    let address = config.server_address.clone();
    let state = Arc::new(AppState::new(db, config, blob_store, ocr));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
