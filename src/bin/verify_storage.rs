//! Storage audit utility
//!
//! Usage: cargo run --bin verify_storage -- [--purge-placeholders] [--placeholder-age-minutes N]
//!
//! This utility will:
//! 1. Connect to the database and the configured blob store
//! 2. Check that every finalized document row points at an existing object
//! 3. Report placeholder rows left behind by uploads that never finished
//! 4. Optionally delete those placeholder rows
//!
//! Exits non-zero when any row points at a missing object.

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use tracing::{error, info, warn};

use propdocs::{
    config::Config,
    db::Database,
    storage::factory::{create_blob_store, storage_config_from_env},
};

#[derive(Parser)]
#[command(name = "verify_storage")]
#[command(about = "Audit document rows against the blob store")]
struct Args {
    /// Delete stale placeholder rows after reporting them
    #[arg(long)]
    purge_placeholders: bool,

    /// Placeholders older than this many minutes are considered stale
    #[arg(long, default_value_t = 60)]
    placeholder_age_minutes: i64,

    /// Only check this many documents
    #[arg(short, long)]
    limit: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    info!("Connecting to database...");
    let db = Database::new(&config.database_url).await?;
    let blob_store = create_blob_store(storage_config_from_env(&config)?).await?;
    info!("Auditing against '{}' storage", blob_store.backend_name());

    let documents = db.list_finalized_documents(args.limit).await?;

    let mut missing = 0usize;
    let mut unreachable = 0usize;
    for document in &documents {
        match blob_store.exists(&document.storage_key).await {
            Ok(true) => {}
            Ok(false) => {
                missing += 1;
                error!(
                    document_id = %document.id,
                    storage_key = %document.storage_key,
                    "Row points at a missing object"
                );
            }
            Err(e) => {
                unreachable += 1;
                warn!(document_id = %document.id, "Could not check object: {:#}", e);
            }
        }
    }

    let cutoff = Utc::now() - Duration::minutes(args.placeholder_age_minutes);
    let placeholders = db.find_stale_placeholders(cutoff).await?;
    for placeholder in &placeholders {
        warn!(
            document_id = %placeholder.id,
            created_at = %placeholder.created_at,
            "Stale placeholder row"
        );
    }

    info!(
        "Checked {} document(s): {} missing object(s), {} unchecked, {} stale placeholder(s)",
        documents.len(),
        missing,
        unreachable,
        placeholders.len()
    );

    if args.purge_placeholders && !placeholders.is_empty() {
        let purged = db.purge_stale_placeholders(cutoff).await?;
        info!("Deleted {} stale placeholder row(s)", purged);
    }

    if missing > 0 {
        std::process::exit(1);
    }
    Ok(())
}
