//! Campaign repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mailspool_common::{AppError, AppResult};
use sea_orm::sea_query::{LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::entities::{Campaign, campaign};
use crate::entities::campaign::CampaignStatus;

/// Result of attempting to claim a scheduled campaign for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller won the scheduled → `in_progress` transition.
    Claimed,
    /// The campaign was no longer scheduled when re-read under lock.
    AlreadyClaimed,
    /// Another scheduler instance holds the row lock; skip this cycle.
    Locked,
}

/// Campaign repository for database operations.
#[derive(Clone)]
pub struct CampaignRepository {
    db: Arc<DatabaseConnection>,
}

impl CampaignRepository {
    /// Create a new campaign repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a campaign by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<campaign::Model>> {
        Campaign::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a campaign by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<campaign::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::CampaignNotFound(id.to_string()))
    }

    /// Find campaigns that are scheduled and due at `now`.
    pub async fn find_due(&self, now: DateTime<Utc>) -> AppResult<Vec<campaign::Model>> {
        Campaign::find()
            .filter(campaign::Column::Status.eq(CampaignStatus::Scheduled))
            .filter(campaign::Column::ScheduledTime.lte(now))
            .order_by_asc(campaign::Column::ScheduledTime)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically claim a scheduled campaign for delivery.
    ///
    /// Opens a transaction, takes a `FOR UPDATE NOWAIT` row lock, re-reads
    /// the status, and only then flips it to `in_progress`. This is the
    /// idempotency guard against concurrent scheduler instances: losing the
    /// lock race or observing a non-scheduled status is a skip, not an
    /// error. This is the single explicit lock in the system.
    pub async fn claim_for_delivery(&self, id: &str) -> AppResult<ClaimOutcome> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let locked = Campaign::find_by_id(id)
            .lock_with_behavior(LockType::Update, LockBehavior::Nowait)
            .one(&txn)
            .await;

        let campaign = match locked {
            Ok(Some(model)) => model,
            Ok(None) => {
                txn.rollback()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                return Err(AppError::CampaignNotFound(id.to_string()));
            }
            Err(e) if is_lock_contention(&e) => {
                txn.rollback()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                return Ok(ClaimOutcome::Locked);
            }
            Err(e) => return Err(AppError::Database(e.to_string())),
        };

        if campaign.status != CampaignStatus::Scheduled {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(ClaimOutcome::AlreadyClaimed);
        }

        let mut active: campaign::ActiveModel = campaign.into();
        active.status = Set(CampaignStatus::InProgress);
        active
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(ClaimOutcome::Claimed)
    }

    /// Transition an `in_progress` campaign to completed.
    pub async fn mark_completed(&self, id: &str) -> AppResult<campaign::Model> {
        let campaign = self.get_by_id(id).await?;

        let mut active: campaign::ActiveModel = campaign.into();
        active.status = Set(CampaignStatus::Completed);
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new campaign.
    pub async fn create(&self, model: campaign::ActiveModel) -> AppResult<campaign::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a campaign.
    pub async fn update(&self, model: campaign::ActiveModel) -> AppResult<campaign::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Postgres reports a `NOWAIT` conflict as SQLSTATE 55P03
/// ("could not obtain lock on row").
fn is_lock_contention(err: &DbErr) -> bool {
    let msg = err.to_string();
    msg.contains("55P03") || msg.contains("could not obtain lock")
}
