//! Parallel staging loader.
//!
//! Loads normalized chunk files into the run's staging table. Each worker
//! opens its own database connection, so bulk inserts never contend with
//! the application pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mailspool_common::{AppError, AppResult};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Loads chunk files into one staging table.
pub struct StagingLoader {
    db_url: String,
    staging_table: String,
    load_batch: usize,
}

impl StagingLoader {
    /// Create a loader targeting the given staging table.
    #[must_use]
    pub fn new(db_url: String, staging_table: String, load_batch: usize) -> Self {
        Self {
            db_url,
            staging_table,
            load_batch: load_batch.max(1),
        }
    }

    /// Load all chunks with at most `workers` concurrent loader tasks.
    ///
    /// Returns the number of staged rows. Any chunk failure fails the whole
    /// load; the caller drops the staging table either way.
    pub async fn load(&self, chunks: Vec<PathBuf>, workers: usize) -> AppResult<u64> {
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let mut tasks: JoinSet<AppResult<u64>> = JoinSet::new();

        for path in chunks {
            let semaphore = semaphore.clone();
            let db_url = self.db_url.clone();
            let table = self.staging_table.clone();
            let batch = self.load_batch;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::Internal(format!("Loader semaphore closed: {e}")))?;
                load_chunk(&db_url, &table, &path, batch).await
            });
        }

        let mut total = 0u64;
        while let Some(joined) = tasks.join_next().await {
            total += joined
                .map_err(|e| AppError::Internal(format!("Loader task panicked: {e}")))??;
        }

        info!(table = %self.staging_table, rows = total, "Staged all chunks");
        Ok(total)
    }
}

/// Load one chunk file over a dedicated connection.
async fn load_chunk(db_url: &str, table: &str, path: &Path, batch: usize) -> AppResult<u64> {
    let conn = Database::connect(db_url)
        .await
        .map_err(|e| AppError::Database(format!("Loader connection failed: {e}")))?;

    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::Internal(format!("Unreadable chunk {}: {e}", path.display())))?;

    let mut rows: Vec<(String, String)> = Vec::with_capacity(batch);
    let mut loaded = 0u64;

    for record in reader.records() {
        let record = record
            .map_err(|e| AppError::Internal(format!("Malformed chunk {}: {e}", path.display())))?;
        let name = record.get(0).unwrap_or("").to_string();
        let email = record.get(1).unwrap_or("").to_string();
        rows.push((name, email));

        if rows.len() >= batch {
            loaded += insert_rows(&conn, table, &rows).await?;
            rows.clear();
        }
    }

    if !rows.is_empty() {
        loaded += insert_rows(&conn, table, &rows).await?;
    }

    debug!(chunk = %path.display(), rows = loaded, "Loaded chunk");

    conn.close()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(loaded)
}

/// Multi-row insert into the staging table.
async fn insert_rows(
    conn: &sea_orm::DatabaseConnection,
    table: &str,
    rows: &[(String, String)],
) -> AppResult<u64> {
    let mut sql = format!("INSERT INTO \"{table}\" (name, email) VALUES ");
    let mut values: Vec<Value> = Vec::with_capacity(rows.len() * 2);

    for (i, (name, email)) in rows.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&format!("(${}, ${})", i * 2 + 1, i * 2 + 2));
        values.push(name.clone().into());
        values.push(email.clone().into());
    }

    conn.execute(Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        sql,
        values,
    ))
    .await
    .map_err(|e| AppError::Database(format!("Staging insert failed: {e}")))?;

    Ok(rows.len() as u64)
}
