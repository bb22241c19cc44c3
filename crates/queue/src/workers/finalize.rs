//! Finalize worker.

use apalis::prelude::*;
use mailspool_common::CampaignConfig;
use mailspool_core::QueueHandle;
use mailspool_db::entities::campaign::CampaignStatus;
use mailspool_db::repositories::{CampaignRepository, DeliveryLogRepository, RecipientRepository};
use tracing::{error, info};

use crate::jobs::FinalizeJob;

/// Context for the finalize worker.
#[derive(Clone)]
pub struct FinalizeContext {
    pub campaign_repo: CampaignRepository,
    pub recipient_repo: RecipientRepository,
    pub log_repo: DeliveryLogRepository,
    pub queue: QueueHandle,
    pub config: CampaignConfig,
}

/// Worker function that completes a campaign once every batch has reported.
///
/// # Errors
/// Returns an error if progress counting or the completion update fails.
pub async fn finalize_worker(job: FinalizeJob, ctx: Data<FinalizeContext>) -> Result<(), Error> {
    match finalize_campaign(&job, &ctx).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(campaign_id = %job.campaign_id, error = %e, "Failed to finalize campaign");
            Err(Error::Failed(e.into()))
        }
    }
}

async fn finalize_campaign(
    job: &FinalizeJob,
    ctx: &FinalizeContext,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let campaign = ctx.campaign_repo.get_by_id(&job.campaign_id).await?;

    // A redelivered finalize job after completion is a no-op, so the
    // completed transition happens exactly once.
    if campaign.status != CampaignStatus::InProgress {
        info!(
            campaign_id = %job.campaign_id,
            status = campaign.status.as_str(),
            "Campaign is not in progress, skipping finalization"
        );
        return Ok(());
    }

    let total_expected = ctx.recipient_repo.count_subscribed().await?;
    let logs_count = ctx.log_repo.count_for_campaign(&job.campaign_id).await?;

    if logs_count < total_expected {
        info!(
            campaign_id = %job.campaign_id,
            logs_count,
            total_expected,
            "Batches still in flight, re-checking later"
        );
        ctx.queue
            .enqueue_finalize(&job.campaign_id, ctx.config.repoll_delay())
            .await?;
        return Ok(());
    }

    ctx.campaign_repo.mark_completed(&job.campaign_id).await?;
    ctx.queue.enqueue_report(&job.campaign_id).await?;

    info!(
        campaign_id = %job.campaign_id,
        logs_count,
        "Campaign completed"
    );
    Ok(())
}
