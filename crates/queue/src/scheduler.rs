//! Periodic scan for due campaigns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mailspool_core::CampaignService;
use tokio::time::interval;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between scheduled-campaign scans.
    pub scan_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60),
        }
    }
}

/// Executor for one scheduler scan.
#[async_trait]
pub trait ScanExecutor: Send + Sync {
    /// Promote due campaigns into delivery; returns how many were started.
    async fn run_scan(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait]
impl ScanExecutor for CampaignService {
    async fn run_scan(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.promote_due(Utc::now()).await.map_err(Into::into)
    }
}

/// Run the scheduler loop.
///
/// A failed scan is logged and retried on the next tick; the loop itself
/// never exits.
pub async fn run_scheduler<E: ScanExecutor + 'static>(config: SchedulerConfig, executor: Arc<E>) {
    tokio::spawn(async move {
        let mut interval = interval(config.scan_interval);
        loop {
            interval.tick().await;
            match executor.run_scan().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Started scheduled campaigns");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Scheduled campaign scan failed");
                }
            }
        }
    });
}
