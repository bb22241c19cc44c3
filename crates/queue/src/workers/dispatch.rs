//! Dispatch worker.

use std::time::Duration;

use apalis::prelude::*;
use mailspool_common::CampaignConfig;
use mailspool_core::QueueHandle;
use mailspool_db::entities::campaign::CampaignStatus;
use mailspool_db::repositories::{CampaignRepository, RecipientRepository};
use tracing::{error, info, warn};

use crate::jobs::DispatchJob;

/// Context for the dispatch worker.
#[derive(Clone)]
pub struct DispatchContext {
    pub campaign_repo: CampaignRepository,
    pub recipient_repo: RecipientRepository,
    pub queue: QueueHandle,
    pub config: CampaignConfig,
}

/// Worker function that fans a campaign out into send batches.
///
/// # Errors
/// Returns an error if batch enumeration or enqueueing fails.
pub async fn dispatch_worker(job: DispatchJob, ctx: Data<DispatchContext>) -> Result<(), Error> {
    info!(campaign_id = %job.campaign_id, "Dispatching campaign");

    match dispatch_campaign(&job, &ctx).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(campaign_id = %job.campaign_id, error = %e, "Failed to dispatch campaign");
            Err(Error::Failed(e.into()))
        }
    }
}

async fn dispatch_campaign(
    job: &DispatchJob,
    ctx: &DispatchContext,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let campaign = ctx.campaign_repo.get_by_id(&job.campaign_id).await?;

    // Redelivered or stale jobs must not restart a finished campaign.
    if campaign.status != CampaignStatus::InProgress {
        warn!(
            campaign_id = %job.campaign_id,
            status = campaign.status.as_str(),
            "Campaign is not in progress, skipping dispatch"
        );
        return Ok(());
    }

    let total = ctx.recipient_repo.count_subscribed().await?;
    if total == 0 {
        info!(
            campaign_id = %job.campaign_id,
            "No subscribed recipients, finalizing immediately"
        );
        ctx.queue
            .enqueue_finalize(&job.campaign_id, Duration::ZERO)
            .await?;
        return Ok(());
    }

    // Keyset pages: memory stays bounded by batch_size however large the
    // recipient table grows.
    let mut after: Option<String> = None;
    let mut batches = 0u64;
    loop {
        let page = ctx
            .recipient_repo
            .subscribed_page_after(after.as_deref(), ctx.config.batch_size)
            .await?;
        if page.is_empty() {
            break;
        }
        after = page.last().cloned();
        ctx.queue.enqueue_send_batch(&job.campaign_id, page).await?;
        batches += 1;
    }

    ctx.queue
        .enqueue_finalize(&job.campaign_id, ctx.config.finalize_delay())
        .await?;

    info!(
        campaign_id = %job.campaign_id,
        total,
        batches,
        "Enqueued send batches"
    );
    Ok(())
}
