//! Staging table lifecycle and merge into the recipient table.

use mailspool_common::{AppError, AppResult};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use tracing::info;

/// Counters produced by the merge step.
///
/// `created` counts permanent rows whose email was staged this run, and
/// `duplicates_skipped` is the remainder of the staged total. A staged email
/// that already existed before the run therefore lands in `created`; the
/// split is kept exactly as operators have learned to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeCounters {
    pub created: u64,
    pub duplicates_skipped: u64,
}

/// Create the run's staging table.
///
/// A real table, not a `TEMPORARY` one: loader workers use their own
/// connections and must all see it.
pub async fn create_staging(db: &DatabaseConnection, table: &str) -> AppResult<()> {
    execute(db, &format!("DROP TABLE IF EXISTS \"{table}\"")).await?;
    execute(db, &format!("CREATE TABLE \"{table}\" (name TEXT, email TEXT)")).await?;
    info!(table = %table, "Created staging table");
    Ok(())
}

/// Drop the run's staging table. Safe to call whether or not it exists.
pub async fn drop_staging(db: &DatabaseConnection, table: &str) -> AppResult<()> {
    execute(db, &format!("DROP TABLE IF EXISTS \"{table}\"")).await
}

/// Merge staged rows into `recipient` and compute the run counters.
///
/// One conflict-ignoring insert; new rows come in as `subscribed`. Duplicate
/// emails within the staged set collapse to a single row.
pub async fn merge(db: &DatabaseConnection, table: &str) -> AppResult<MergeCounters> {
    execute(
        db,
        &format!(
            "INSERT INTO recipient (id, name, email, subscription_status, created_at) \
             SELECT replace(gen_random_uuid()::text, '-', ''), name, email, 'subscribed', NOW() \
             FROM \"{table}\" \
             ON CONFLICT (email) DO NOTHING"
        ),
    )
    .await?;

    let total = count(db, &format!("SELECT COUNT(*) AS cnt FROM \"{table}\"")).await?;
    let created = count(
        db,
        &format!(
            "SELECT COUNT(*) AS cnt FROM recipient \
             WHERE email IN (SELECT email FROM \"{table}\")"
        ),
    )
    .await?;

    let counters = MergeCounters {
        created,
        duplicates_skipped: total.saturating_sub(created),
    };

    info!(
        table = %table,
        created = counters.created,
        duplicates_skipped = counters.duplicates_skipped,
        "Merged staging table into recipients"
    );

    Ok(counters)
}

async fn execute(db: &DatabaseConnection, sql: &str) -> AppResult<()> {
    db.execute(Statement::from_string(
        DatabaseBackend::Postgres,
        sql.to_string(),
    ))
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

async fn count(db: &DatabaseConnection, sql: &str) -> AppResult<u64> {
    let row = db
        .query_one(Statement::from_string(
            DatabaseBackend::Postgres,
            sql.to_string(),
        ))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::Database("Count query returned no row".to_string()))?;

    let cnt: i64 = row
        .try_get("", "cnt")
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(cnt.max(0) as u64)
}
