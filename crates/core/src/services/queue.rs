//! Campaign queue abstraction.
//!
//! Provides an abstraction for enqueueing campaign pipeline jobs.
//! The actual implementation is provided by the queue crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mailspool_common::AppResult;

/// Trait for enqueueing campaign pipeline jobs.
///
/// This allows the core services to hand work to the pipeline without
/// directly depending on the queue implementation.
#[async_trait]
pub trait CampaignQueue: Send + Sync {
    /// Queue a dispatch job that fans a campaign out into send batches.
    async fn enqueue_dispatch(&self, campaign_id: &str) -> AppResult<()>;

    /// Queue one batch of recipient IDs for sending.
    async fn enqueue_send_batch(
        &self,
        campaign_id: &str,
        recipient_ids: Vec<String>,
    ) -> AppResult<()>;

    /// Queue a finalization attempt after the given delay.
    async fn enqueue_finalize(&self, campaign_id: &str, delay: Duration) -> AppResult<()>;

    /// Queue report generation for a completed campaign.
    async fn enqueue_report(&self, campaign_id: &str) -> AppResult<()>;
}

/// Wrapper for boxed `CampaignQueue` trait object.
pub type QueueHandle = Arc<dyn CampaignQueue>;

/// A no-op implementation of `CampaignQueue` for testing or one-shot tools
/// that never touch the pipeline.
#[derive(Clone, Default)]
pub struct NoOpQueue;

#[async_trait]
impl CampaignQueue for NoOpQueue {
    async fn enqueue_dispatch(&self, _campaign_id: &str) -> AppResult<()> {
        Ok(())
    }

    async fn enqueue_send_batch(
        &self,
        _campaign_id: &str,
        _recipient_ids: Vec<String>,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn enqueue_finalize(&self, _campaign_id: &str, _delay: Duration) -> AppResult<()> {
        Ok(())
    }

    async fn enqueue_report(&self, _campaign_id: &str) -> AppResult<()> {
        Ok(())
    }
}

/// A job captured by [`RecordingQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueuedJob {
    Dispatch {
        campaign_id: String,
    },
    SendBatch {
        campaign_id: String,
        recipient_ids: Vec<String>,
    },
    Finalize {
        campaign_id: String,
        delay: Duration,
    },
    Report {
        campaign_id: String,
    },
}

/// Test double that records every enqueued job in order.
#[derive(Clone, Default)]
pub struct RecordingQueue {
    jobs: Arc<tokio::sync::Mutex<Vec<EnqueuedJob>>>,
}

impl RecordingQueue {
    /// Create an empty recording queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the jobs enqueued so far.
    pub async fn jobs(&self) -> Vec<EnqueuedJob> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl CampaignQueue for RecordingQueue {
    async fn enqueue_dispatch(&self, campaign_id: &str) -> AppResult<()> {
        self.jobs.lock().await.push(EnqueuedJob::Dispatch {
            campaign_id: campaign_id.to_string(),
        });
        Ok(())
    }

    async fn enqueue_send_batch(
        &self,
        campaign_id: &str,
        recipient_ids: Vec<String>,
    ) -> AppResult<()> {
        self.jobs.lock().await.push(EnqueuedJob::SendBatch {
            campaign_id: campaign_id.to_string(),
            recipient_ids,
        });
        Ok(())
    }

    async fn enqueue_finalize(&self, campaign_id: &str, delay: Duration) -> AppResult<()> {
        self.jobs.lock().await.push(EnqueuedJob::Finalize {
            campaign_id: campaign_id.to_string(),
            delay,
        });
        Ok(())
    }

    async fn enqueue_report(&self, campaign_id: &str) -> AppResult<()> {
        self.jobs.lock().await.push(EnqueuedJob::Report {
            campaign_id: campaign_id.to_string(),
        });
        Ok(())
    }
}
