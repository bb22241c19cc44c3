//! Queue integration tests.
//!
//! These tests verify the queue components work correctly together.

use std::time::Duration;

use mailspool_common::{EmailConfig, SmtpConfig};
use mailspool_queue::{
    DispatchJob, FinalizeJob, RateLimitConfig, ReportJob, RetryConfig, SchedulerConfig,
    SendBatchJob,
};

fn email_config(api_key: Option<&str>, smtp_host: &str) -> EmailConfig {
    EmailConfig {
        from_address: "noreply@example.com".to_string(),
        from_name: "Mailspool".to_string(),
        report_address: "ops@example.com".to_string(),
        api_key: api_key.map(String::from),
        smtp: SmtpConfig {
            host: smtp_host.to_string(),
            port: 587,
            username: None,
            password: None,
        },
    }
}

#[test]
fn test_job_serialization_roundtrip() {
    let dispatch = DispatchJob::new("campaign-1".to_string());
    let json = serde_json::to_string(&dispatch).expect("Serialization failed");
    let parsed: DispatchJob = serde_json::from_str(&json).expect("Deserialization failed");
    assert_eq!(parsed.campaign_id, "campaign-1");

    let batch = SendBatchJob::new(
        "campaign-1".to_string(),
        vec!["r1".to_string(), "r2".to_string()],
    );
    let json = serde_json::to_string(&batch).expect("Serialization failed");
    let parsed: SendBatchJob = serde_json::from_str(&json).expect("Deserialization failed");
    assert_eq!(parsed.recipient_ids.len(), 2);

    let finalize = FinalizeJob::new("campaign-1".to_string());
    let json = serde_json::to_string(&finalize).expect("Serialization failed");
    let parsed: FinalizeJob = serde_json::from_str(&json).expect("Deserialization failed");
    assert_eq!(parsed.campaign_id, "campaign-1");

    let report = ReportJob::new("campaign-1".to_string());
    let json = serde_json::to_string(&report).expect("Serialization failed");
    let parsed: ReportJob = serde_json::from_str(&json).expect("Deserialization failed");
    assert_eq!(parsed.campaign_id, "campaign-1");
}

#[test]
fn test_send_rate_follows_provider() {
    // API-backed sending runs at 3 batches per 2 seconds.
    let api = RateLimitConfig::for_provider(&email_config(Some("key"), "smtp.example.com"));
    assert_eq!(api.max_jobs, 3);
    assert_eq!(api.window, Duration::from_secs(2));

    // Consumer relays get a daily trickle.
    let relay = RateLimitConfig::for_provider(&email_config(None, "smtp.gmail.com"));
    assert_eq!(relay.max_jobs, 10);
    assert_eq!(relay.window, Duration::from_secs(86_400));

    // Unknown relays default to one batch per second.
    let other = RateLimitConfig::for_provider(&email_config(None, "mail.internal.example"));
    assert_eq!(other.max_jobs, 1);
    assert_eq!(other.window, Duration::from_secs(1));
}

#[test]
fn test_retry_config_defaults() {
    let config = RetryConfig::default();

    assert_eq!(config.max_retries, 3);
    assert!(config.should_retry(2));
    assert!(!config.should_retry(3));

    // Backoff doubles from the initial delay and never exceeds the cap.
    assert_eq!(config.delay_for_attempt(0), Duration::from_secs(10));
    assert_eq!(config.delay_for_attempt(1), Duration::from_secs(20));
    assert!(config.delay_for_attempt(10) <= config.max_delay);
}

#[test]
fn test_scheduler_config_default_interval() {
    let config = SchedulerConfig::default();
    assert_eq!(config.scan_interval, Duration::from_secs(60));
}
