//! Application configuration.
//!
//! Everything the pipeline needs — provider credentials, batch sizes,
//! re-poll delays — is explicit configuration threaded into each component
//! at construction, never read from ambient global state.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis (job queue) configuration.
    pub redis: RedisConfig,
    /// Email transport configuration.
    pub email: EmailConfig,
    /// Campaign pipeline tuning.
    #[serde(default)]
    pub campaign: CampaignConfig,
    /// Bulk recipient ingestion tuning.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all queue namespaces.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Email transport configuration.
///
/// The API transport is the primary when an API key is configured; SMTP is
/// the fallback (and the only transport otherwise).
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Sender address placed on outgoing mail.
    pub from_address: String,
    /// Sender display name.
    #[serde(default)]
    pub from_name: String,
    /// Operator mailbox that receives campaign delivery reports.
    pub report_address: String,
    /// API provider key (SendGrid-style). Absent means SMTP-only.
    #[serde(default)]
    pub api_key: Option<String>,
    /// SMTP transport settings.
    pub smtp: SmtpConfig,
}

/// SMTP transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP relay host.
    pub host: String,
    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Username, if the relay requires authentication.
    #[serde(default)]
    pub username: Option<String>,
    /// Password, if the relay requires authentication.
    #[serde(default)]
    pub password: Option<String>,
}

/// Campaign pipeline tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    /// Recipients per send batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Delivery log rows per bulk insert.
    #[serde(default = "default_log_batch")]
    pub log_batch: usize,
    /// Seconds between scheduled-campaign scans.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// Delay before the first finalization attempt after dispatch.
    #[serde(default = "default_finalize_delay_secs")]
    pub finalize_delay_secs: u64,
    /// Delay between finalizer re-polls while batches are still running.
    #[serde(default = "default_repoll_delay_secs")]
    pub repoll_delay_secs: u64,
    /// IANA time zone name used for report timestamps.
    #[serde(default = "default_report_timezone")]
    pub report_timezone: String,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            log_batch: default_log_batch(),
            scan_interval_secs: default_scan_interval_secs(),
            finalize_delay_secs: default_finalize_delay_secs(),
            repoll_delay_secs: default_repoll_delay_secs(),
            report_timezone: default_report_timezone(),
        }
    }
}

impl CampaignConfig {
    /// Interval between scheduled-campaign scans.
    #[must_use]
    pub const fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Delay before the first finalization attempt.
    #[must_use]
    pub const fn finalize_delay(&self) -> Duration {
        Duration::from_secs(self.finalize_delay_secs)
    }

    /// Delay between finalizer re-polls.
    #[must_use]
    pub const fn repoll_delay(&self) -> Duration {
        Duration::from_secs(self.repoll_delay_secs)
    }
}

/// Bulk recipient ingestion tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Rows per chunk file.
    #[serde(default = "default_chunk_rows")]
    pub chunk_rows: usize,
    /// Rows per staging insert statement.
    #[serde(default = "default_load_batch")]
    pub load_batch: usize,
    /// Worker pool size override. Defaults to half the available
    /// processing units, never fewer than two.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_rows: default_chunk_rows(),
            load_batch: default_load_batch(),
            workers: None,
        }
    }
}

impl IngestConfig {
    /// Effective worker pool size.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            let cpus = std::thread::available_parallelism().map_or(2, std::num::NonZero::get);
            (cpus / 2).max(2)
        })
    }
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "mailspool".to_string()
}

const fn default_smtp_port() -> u16 {
    587
}

const fn default_batch_size() -> u64 {
    200
}

const fn default_log_batch() -> usize {
    500
}

const fn default_scan_interval_secs() -> u64 {
    60
}

const fn default_finalize_delay_secs() -> u64 {
    300
}

const fn default_repoll_delay_secs() -> u64 {
    120
}

fn default_report_timezone() -> String {
    "UTC".to_string()
}

const fn default_chunk_rows() -> usize {
    200_000
}

const fn default_load_batch() -> usize {
    1000
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `MAILSPOOL_ENV`)
    /// 3. Environment variables with `MAILSPOOL` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("MAILSPOOL_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("MAILSPOOL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("MAILSPOOL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
