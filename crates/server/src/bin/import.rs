//! One-shot bulk recipient import tool.
//!
//! Reads a CSV or spreadsheet of recipients and runs the full ingestion
//! pipeline: normalize/split, parallel staging load, merge.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use mailspool_common::Config;
use mailspool_core::RecipientImporter;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailspool=info".into()),
        )
        .init();

    let input: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("Usage: mailspool-import <recipients.csv|recipients.xlsx>")?;

    let config = Config::load().context("Failed to load configuration")?;

    let db = mailspool_db::init(&config)
        .await
        .context("Failed to connect to database")?;

    mailspool_db::migrate(&db)
        .await
        .context("Failed to run migrations")?;

    let importer = RecipientImporter::new(
        Arc::new(db),
        config.database.url.clone(),
        config.ingest.clone(),
    );

    info!(input = %input.display(), "Starting recipient import");
    let summary = importer.import(&input).await.context("Import failed")?;

    info!(
        created = summary.created,
        duplicates_skipped = summary.duplicates_skipped,
        invalid_rows = summary.invalid_rows,
        staged_rows = summary.staged_rows,
        "Import finished"
    );
    Ok(())
}
