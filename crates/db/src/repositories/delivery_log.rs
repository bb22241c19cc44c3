//! Delivery log repository.

use std::sync::Arc;

use futures::Stream;
use mailspool_common::{AppError, AppResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};

use crate::entities::{DeliveryLog, delivery_log};

/// Delivery log repository for database operations.
#[derive(Clone)]
pub struct DeliveryLogRepository {
    db: Arc<DatabaseConnection>,
}

impl DeliveryLogRepository {
    /// Create a new delivery log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Bulk insert delivery logs, ignoring conflicts.
    ///
    /// A retried batch may re-insert rows it already wrote; those are
    /// absorbed, never surfaced as errors. Returns the number of rows
    /// handed to the store.
    pub async fn insert_many_ignore_conflicts(
        &self,
        models: Vec<delivery_log::ActiveModel>,
    ) -> AppResult<u64> {
        if models.is_empty() {
            return Ok(0);
        }

        let count = models.len() as u64;

        DeliveryLog::insert_many(models)
            .on_conflict(OnConflict::new().do_nothing().to_owned())
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Count delivery logs for a campaign.
    pub async fn count_for_campaign(&self, campaign_id: &str) -> AppResult<u64> {
        DeliveryLog::find()
            .filter(delivery_log::Column::CampaignId.eq(campaign_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Stream a campaign's delivery logs ordered by recipient email.
    ///
    /// Row-by-row stream for report generation; the result set is never
    /// materialized in memory.
    pub async fn stream_for_campaign_by_email(
        &self,
        campaign_id: &str,
    ) -> AppResult<impl Stream<Item = Result<delivery_log::Model, DbErr>> + Send + '_> {
        DeliveryLog::find()
            .filter(delivery_log::Column::CampaignId.eq(campaign_id))
            .order_by_asc(delivery_log::Column::RecipientEmail)
            .stream(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load all logs for a campaign ordered by recipient email.
    ///
    /// Non-streaming variant for small result sets and tests.
    pub async fn find_for_campaign_by_email(
        &self,
        campaign_id: &str,
    ) -> AppResult<Vec<delivery_log::Model>> {
        DeliveryLog::find()
            .filter(delivery_log::Column::CampaignId.eq(campaign_id))
            .order_by_asc(delivery_log::Column::RecipientEmail)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
