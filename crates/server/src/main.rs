//! Mailspool worker daemon entry point.
//!
//! Wires configuration, database, Redis job lanes, the campaign pipeline
//! workers and the scheduled-campaign scanner into one process.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context as _;
use apalis::prelude::*;
use apalis_redis::RedisStorage;
use chrono_tz::Tz;
use mailspool_common::{Config, IdGenerator};
use mailspool_core::{
    CampaignService, ProviderGateway, QueueHandle, ReportService, TransportHandle,
};
use mailspool_db::repositories::{CampaignRepository, DeliveryLogRepository, RecipientRepository};
use mailspool_queue::{
    DispatchContext, DispatchJob, FinalizeContext, FinalizeJob, RateLimitConfig, RateLimitLayer,
    RedisCampaignQueue, ReportContext, ReportJob, RetryConfig, SchedulerConfig, SendBatchContext,
    SendBatchJob, dispatch_worker, finalize_worker, report_worker, run_scheduler,
    send_batch_worker,
};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = ctrl_c => {
                info!("Received SIGINT, initiating graceful shutdown...");
                result
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown...");
                Ok(())
            }
        }
    }

    #[cfg(not(unix))]
    {
        let result = ctrl_c.await;
        info!("Received Ctrl+C, initiating graceful shutdown...");
        result
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailspool=debug".into()),
        )
        .init();

    info!("Starting mailspool worker daemon...");

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Connect to database
    let db = mailspool_db::init(&config)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    mailspool_db::migrate(&db)
        .await
        .context("Failed to run migrations")?;
    info!("Migrations completed");

    // Connect to Redis and initialize the job lanes
    info!("Connecting to Redis...");
    let redis_client =
        redis::Client::open(config.redis.url.as_str()).context("Failed to create Redis client")?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client)
        .await
        .context("Failed to connect to Redis")?;

    let lane = |name: &str| {
        apalis_redis::Config::default().set_namespace(&format!("{}:{name}", config.redis.prefix))
    };
    let dispatch_storage =
        RedisStorage::<DispatchJob>::new_with_config(redis_conn.clone(), lane("dispatch"));
    let send_storage =
        RedisStorage::<SendBatchJob>::new_with_config(redis_conn.clone(), lane("senders"));
    let finalize_storage =
        RedisStorage::<FinalizeJob>::new_with_config(redis_conn.clone(), lane("finalize"));
    let report_storage =
        RedisStorage::<ReportJob>::new_with_config(redis_conn, lane("reports"));
    info!("Connected to Redis job queue");

    let queue: QueueHandle = Arc::new(RedisCampaignQueue::new(
        dispatch_storage.clone(),
        send_storage.clone(),
        finalize_storage.clone(),
        report_storage.clone(),
    ));

    // Initialize repositories
    let db = Arc::new(db);
    let campaign_repo = CampaignRepository::new(Arc::clone(&db));
    let recipient_repo = RecipientRepository::new(Arc::clone(&db));
    let log_repo = DeliveryLogRepository::new(Arc::clone(&db));

    // Initialize services
    let gateway =
        ProviderGateway::new(config.email.clone()).context("Failed to build provider gateway")?;
    info!(provider = gateway.provider_label(), "Email transport ready");

    let timezone = Tz::from_str(&config.campaign.report_timezone)
        .map_err(|e| anyhow::anyhow!("Invalid report timezone: {e}"))?;
    let report_service = ReportService::new(
        campaign_repo.clone(),
        log_repo.clone(),
        gateway.clone(),
        timezone,
    );

    let campaign_service = Arc::new(CampaignService::new(
        campaign_repo.clone(),
        recipient_repo.clone(),
        queue.clone(),
    ));

    // Start the scheduled-campaign scanner
    run_scheduler(
        SchedulerConfig {
            scan_interval: config.campaign.scan_interval(),
        },
        campaign_service,
    )
    .await;
    info!("Scheduled-campaign scanner started");

    // Worker contexts
    let dispatch_ctx = DispatchContext {
        campaign_repo: campaign_repo.clone(),
        recipient_repo: recipient_repo.clone(),
        queue: queue.clone(),
        config: config.campaign.clone(),
    };
    let transport: TransportHandle = Arc::new(gateway);
    let send_ctx = SendBatchContext {
        campaign_repo: campaign_repo.clone(),
        recipient_repo: recipient_repo.clone(),
        log_repo: log_repo.clone(),
        transport,
        log_batch: config.campaign.log_batch,
        id_gen: IdGenerator::new(),
    };
    let finalize_ctx = FinalizeContext {
        campaign_repo,
        recipient_repo,
        log_repo,
        queue,
        config: config.campaign.clone(),
    };
    let report_ctx = ReportContext { report_service };

    // The send lane is the only one that is paced and retried: provider
    // rejections are recorded as failed logs, so retries only ever re-run
    // infrastructure failures.
    let send_rate = RateLimitConfig::for_provider(&config.email);
    let retry = RetryConfig::default();
    info!(
        max_jobs = send_rate.max_jobs,
        window_secs = send_rate.window.as_secs(),
        "Configured send-lane rate"
    );

    info!("Starting campaign pipeline workers...");
    let monitor = Monitor::new()
        .register(
            WorkerBuilder::new("dispatch")
                .data(dispatch_ctx)
                .backend(dispatch_storage)
                .build_fn(dispatch_worker),
        )
        .register(
            WorkerBuilder::new("send-batch")
                .data(send_ctx)
                .retry(retry.policy())
                .layer(RateLimitLayer::new(send_rate))
                .backend(send_storage)
                .build_fn(send_batch_worker),
        )
        .register(
            WorkerBuilder::new("finalize")
                .data(finalize_ctx)
                .backend(finalize_storage)
                .build_fn(finalize_worker),
        )
        .register(
            WorkerBuilder::new("report")
                .data(report_ctx)
                .backend(report_storage)
                .build_fn(report_worker),
        );

    monitor.run_with_signal(shutdown_signal()).await?;

    info!("Worker daemon shutdown complete");
    Ok(())
}
