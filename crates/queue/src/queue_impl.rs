//! Redis-backed campaign queue implementation.
//!
//! Implements the core crate's `CampaignQueue` trait by pushing jobs into
//! per-lane apalis Redis storages.

use std::time::Duration;

use apalis::prelude::*;
use apalis_redis::RedisStorage;
use async_trait::async_trait;
use chrono::Utc;
use mailspool_common::{AppError, AppResult};
use mailspool_core::CampaignQueue;
use tracing::debug;

use crate::jobs::{DispatchJob, FinalizeJob, ReportJob, SendBatchJob};

/// Redis-backed campaign queue.
///
/// Holds one storage per lane; pushes clone the storage handle, which is
/// cheap (an inner connection handle).
#[derive(Clone)]
pub struct RedisCampaignQueue {
    dispatch: RedisStorage<DispatchJob>,
    senders: RedisStorage<SendBatchJob>,
    finalize: RedisStorage<FinalizeJob>,
    reports: RedisStorage<ReportJob>,
}

impl RedisCampaignQueue {
    /// Create a queue over the four lane storages.
    #[must_use]
    pub const fn new(
        dispatch: RedisStorage<DispatchJob>,
        senders: RedisStorage<SendBatchJob>,
        finalize: RedisStorage<FinalizeJob>,
        reports: RedisStorage<ReportJob>,
    ) -> Self {
        Self {
            dispatch,
            senders,
            finalize,
            reports,
        }
    }
}

#[async_trait]
impl CampaignQueue for RedisCampaignQueue {
    async fn enqueue_dispatch(&self, campaign_id: &str) -> AppResult<()> {
        self.dispatch
            .clone()
            .push(DispatchJob::new(campaign_id.to_string()))
            .await
            .map_err(|e| AppError::Queue(format!("Failed to queue dispatch job: {e}")))?;

        debug!(campaign_id = %campaign_id, "Queued dispatch job");
        Ok(())
    }

    async fn enqueue_send_batch(
        &self,
        campaign_id: &str,
        recipient_ids: Vec<String>,
    ) -> AppResult<()> {
        let batch_size = recipient_ids.len();
        self.senders
            .clone()
            .push(SendBatchJob::new(campaign_id.to_string(), recipient_ids))
            .await
            .map_err(|e| AppError::Queue(format!("Failed to queue send batch: {e}")))?;

        debug!(campaign_id = %campaign_id, batch_size, "Queued send batch");
        Ok(())
    }

    async fn enqueue_finalize(&self, campaign_id: &str, delay: Duration) -> AppResult<()> {
        let run_at = (Utc::now()
            + chrono::Duration::from_std(delay)
                .map_err(|e| AppError::Queue(format!("Finalize delay out of range: {e}")))?)
        .timestamp();

        self.finalize
            .clone()
            .schedule(FinalizeJob::new(campaign_id.to_string()), run_at)
            .await
            .map_err(|e| AppError::Queue(format!("Failed to schedule finalize job: {e}")))?;

        debug!(
            campaign_id = %campaign_id,
            delay_secs = delay.as_secs(),
            "Scheduled finalize job"
        );
        Ok(())
    }

    async fn enqueue_report(&self, campaign_id: &str) -> AppResult<()> {
        self.reports
            .clone()
            .push(ReportJob::new(campaign_id.to_string()))
            .await
            .map_err(|e| AppError::Queue(format!("Failed to queue report job: {e}")))?;

        debug!(campaign_id = %campaign_id, "Queued report job");
        Ok(())
    }
}
