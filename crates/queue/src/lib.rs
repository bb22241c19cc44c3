//! Job queue system for mailspool.
//!
//! This crate provides the Redis-backed delivery pipeline:
//! - **Job types**: dispatch, send-batch, finalize, and report jobs
//! - **Queue**: [`RedisCampaignQueue`], the pipeline's enqueue surface
//! - **Workers**: apalis worker functions for each job lane
//! - **Scheduler**: a periodic scan that starts due campaigns
//! - **Rate limiting**: provider-derived pacing for the send lane
//! - **Retry**: exponential backoff for infrastructure failures

pub mod jobs;
pub mod queue_impl;
pub mod rate_limit;
pub mod retry;
pub mod scheduler;
pub mod workers;

pub use jobs::{DispatchJob, FinalizeJob, ReportJob, SendBatchJob};
pub use queue_impl::RedisCampaignQueue;
pub use rate_limit::{RateLimitConfig, RateLimitLayer};
pub use retry::{ConfiguredBackoff, RetryConfig};
pub use scheduler::{ScanExecutor, SchedulerConfig, run_scheduler};
pub use workers::{
    DispatchContext, FinalizeContext, ReportContext, SendBatchContext, dispatch_worker,
    finalize_worker, report_worker, send_batch_worker,
};
