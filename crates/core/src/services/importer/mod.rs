//! Bulk recipient ingestion.
//!
//! Three stages, run strictly in order:
//!
//! 1. **Normalize/split** — clean the upload into header-carrying CSV
//!    chunk files ([`normalize`]).
//! 2. **Parallel load** — stage the chunks over a worker pool of dedicated
//!    connections ([`loader`]).
//! 3. **Merge** — one conflict-ignoring insert into `recipient`, then
//!    counters and cleanup ([`merge`]).
//!
//! The staging table is keyed by a per-run identifier, so concurrent
//! imports never share state.

mod loader;
mod merge;
mod normalize;

use std::path::Path;
use std::sync::Arc;

use mailspool_common::{AppError, AppResult, IngestConfig, id::IdGenerator};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

pub use loader::StagingLoader;
pub use merge::MergeCounters;
pub use normalize::{ChunkSet, is_spreadsheet, is_valid_email, split_into_chunks};

/// Outcome of one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Permanent rows whose email was staged this run.
    pub created: u64,
    /// Staged rows that collapsed into existing or duplicate emails.
    pub duplicates_skipped: u64,
    /// Rows dropped during normalization for missing or malformed emails.
    pub invalid_rows: u64,
    /// Rows that made it into the staging table.
    pub staged_rows: u64,
}

/// Orchestrates one bulk recipient import.
pub struct RecipientImporter {
    db: Arc<DatabaseConnection>,
    db_url: String,
    config: IngestConfig,
    id_gen: IdGenerator,
}

impl RecipientImporter {
    /// Create an importer.
    ///
    /// `db_url` is handed to loader workers so each can open its own
    /// connection.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, db_url: String, config: IngestConfig) -> Self {
        Self {
            db,
            db_url,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Run the full import pipeline for one uploaded file.
    ///
    /// The staging table and chunk files are removed on success and failure
    /// alike.
    pub async fn import(&self, input: &Path) -> AppResult<ImportSummary> {
        let chunk_rows = self.config.chunk_rows;
        let owned_input = input.to_path_buf();
        let chunks =
            tokio::task::spawn_blocking(move || split_into_chunks(&owned_input, chunk_rows))
                .await
                .map_err(|e| AppError::Internal(format!("Normalizer task panicked: {e}")))??;

        info!(
            chunks = chunks.paths.len(),
            rows = chunks.rows,
            invalid_rows = chunks.invalid_rows,
            "Normalized ingest input"
        );

        let run_id = self.id_gen.generate_run_id();
        let table = format!("recipient_staging_{run_id}");
        merge::create_staging(self.db.as_ref(), &table).await?;

        let outcome = self.load_and_merge(&table, &chunks).await;

        if let Err(e) = merge::drop_staging(self.db.as_ref(), &table).await {
            warn!(table = %table, error = %e, "Failed to drop staging table");
        }

        let counters = outcome?;
        Ok(ImportSummary {
            created: counters.created,
            duplicates_skipped: counters.duplicates_skipped,
            invalid_rows: chunks.invalid_rows,
            staged_rows: chunks.rows,
        })
    }

    async fn load_and_merge(&self, table: &str, chunks: &ChunkSet) -> AppResult<MergeCounters> {
        let loader = StagingLoader::new(
            self.db_url.clone(),
            table.to_string(),
            self.config.load_batch,
        );
        loader
            .load(chunks.paths.clone(), self.config.worker_count())
            .await?;

        merge::merge(self.db.as_ref(), table).await
    }
}
