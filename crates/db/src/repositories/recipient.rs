//! Recipient repository.

use std::sync::Arc;

use mailspool_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::recipient::SubscriptionStatus;
use crate::entities::{Recipient, recipient};

/// Recipient repository for database operations.
#[derive(Clone)]
pub struct RecipientRepository {
    db: Arc<DatabaseConnection>,
}

impl RecipientRepository {
    /// Create a new recipient repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a recipient by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<recipient::Model>> {
        Recipient::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a recipient by email.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<recipient::Model>> {
        Recipient::find()
            .filter(recipient::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count currently subscribed recipients.
    ///
    /// The finalizer's `total_expected`; recomputed on every poll.
    pub async fn count_subscribed(&self) -> AppResult<u64> {
        Recipient::find()
            .filter(recipient::Column::SubscriptionStatus.eq(SubscriptionStatus::Subscribed))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Fetch one keyset page of subscribed recipient IDs, ordered by ID.
    ///
    /// Pass the last ID of the previous page to advance; `None` starts from
    /// the beginning. Keyset pagination keeps dispatch memory bounded no
    /// matter how large the recipient set grows.
    pub async fn subscribed_page_after(
        &self,
        after_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<String>> {
        let mut query = Recipient::find()
            .select_only()
            .column(recipient::Column::Id)
            .filter(recipient::Column::SubscriptionStatus.eq(SubscriptionStatus::Subscribed));

        if let Some(after) = after_id {
            query = query.filter(recipient::Column::Id.gt(after));
        }

        query
            .order_by_asc(recipient::Column::Id)
            .limit(limit)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load recipients by ID.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<recipient::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Recipient::find()
            .filter(recipient::Column::Id.is_in(ids.iter().map(String::as_str)))
            .order_by_asc(recipient::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new recipient.
    pub async fn create(&self, model: recipient::ActiveModel) -> AppResult<recipient::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Flip a recipient's subscription status (operator action).
    pub async fn set_subscription_status(
        &self,
        id: &str,
        status: SubscriptionStatus,
    ) -> AppResult<recipient::Model> {
        let recipient = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Recipient {id} not found")))?;

        let mut active: recipient::ActiveModel = recipient.into();
        active.subscription_status = Set(status);
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
