//! Campaign lifecycle service.

use chrono::{DateTime, Utc};
use mailspool_common::{AppError, AppResult, id::IdGenerator};
use mailspool_db::entities::campaign::{self, CampaignStatus};
use mailspool_db::entities::recipient::{self, SubscriptionStatus};
use mailspool_db::repositories::{CampaignRepository, ClaimOutcome, RecipientRepository};
use sea_orm::Set;
use serde::Deserialize;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::services::queue::QueueHandle;

/// Input for creating a campaign.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCampaignInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub subject: String,
    /// HTML body. Sanitized upstream.
    #[validate(length(min = 1))]
    pub content: String,
    /// When set, the campaign is created as `scheduled` and picked up by the
    /// periodic scan once the time passes.
    pub scheduled_time: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}

/// Input for updating a campaign.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCampaignInput {
    pub campaign_id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub subject: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Service for managing campaign lifecycle.
#[derive(Clone)]
pub struct CampaignService {
    campaign_repo: CampaignRepository,
    recipient_repo: RecipientRepository,
    queue: QueueHandle,
    id_gen: IdGenerator,
}

impl CampaignService {
    /// Create a new campaign service.
    #[must_use]
    pub fn new(
        campaign_repo: CampaignRepository,
        recipient_repo: RecipientRepository,
        queue: QueueHandle,
    ) -> Self {
        Self {
            campaign_repo,
            recipient_repo,
            queue,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a campaign by ID.
    pub async fn get_by_id(&self, id: &str) -> AppResult<campaign::Model> {
        self.campaign_repo.get_by_id(id).await
    }

    /// Create a new campaign.
    ///
    /// A `scheduled_time` in the past is allowed; the next scan picks the
    /// campaign up immediately.
    pub async fn create(&self, input: CreateCampaignInput) -> AppResult<campaign::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let status = if input.scheduled_time.is_some() {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Draft
        };

        let model = campaign::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(input.name),
            subject: Set(input.subject),
            content: Set(input.content),
            scheduled_time: Set(input.scheduled_time.map(Into::into)),
            status: Set(status),
            created_by: Set(input.created_by),
            created_at: Set(Utc::now().into()),
        };

        let created = self.campaign_repo.create(model).await?;
        info!(campaign_id = %created.id, status = ?created.status, "Created campaign");
        Ok(created)
    }

    /// Update a campaign.
    ///
    /// Campaigns that have entered delivery are frozen: any edit to an
    /// `in_progress` or `completed` campaign is rejected with a conflict.
    pub async fn update(&self, input: UpdateCampaignInput) -> AppResult<campaign::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let campaign = self.campaign_repo.get_by_id(&input.campaign_id).await?;

        if campaign.status.is_frozen() {
            return Err(AppError::Conflict(format!(
                "Campaign {} is {} and can no longer be edited",
                campaign.id,
                campaign.status.as_str()
            )));
        }

        let was_draft = campaign.status == CampaignStatus::Draft;
        let mut active: campaign::ActiveModel = campaign.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(subject) = input.subject {
            active.subject = Set(subject);
        }
        if let Some(content) = input.content {
            active.content = Set(content);
        }
        if let Some(scheduled_time) = input.scheduled_time {
            active.scheduled_time = Set(Some(scheduled_time.into()));
            if was_draft {
                active.status = Set(CampaignStatus::Scheduled);
            }
        }

        self.campaign_repo.update(active).await
    }

    /// Promote due campaigns into delivery.
    ///
    /// For each scheduled campaign whose time has passed: claim it under a
    /// row lock, and only on winning the claim enqueue the dispatch job.
    /// The enqueue happens after the claim transaction commits, so a crash
    /// between the two leaves an `in_progress` campaign without jobs rather
    /// than duplicate dispatches. Returns the number of campaigns started.
    pub async fn promote_due(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let due = self.campaign_repo.find_due(now).await?;
        let mut started = 0u64;

        for candidate in due {
            match self.campaign_repo.claim_for_delivery(&candidate.id).await? {
                ClaimOutcome::Claimed => {
                    self.queue.enqueue_dispatch(&candidate.id).await?;
                    info!(campaign_id = %candidate.id, "Started scheduled campaign");
                    started += 1;
                }
                ClaimOutcome::AlreadyClaimed => {
                    debug!(campaign_id = %candidate.id, "Campaign already claimed, skipping");
                }
                ClaimOutcome::Locked => {
                    warn!(campaign_id = %candidate.id, "Campaign row locked by another scheduler, skipping");
                }
            }
        }

        Ok(started)
    }

    /// Flip a recipient's subscription status.
    ///
    /// Takes effect on the next dispatch; batches already enqueued still
    /// carry the recipient.
    pub async fn set_recipient_subscription(
        &self,
        recipient_id: &str,
        status: SubscriptionStatus,
    ) -> AppResult<recipient::Model> {
        self.recipient_repo
            .set_subscription_status(recipient_id, status)
            .await
    }
}
