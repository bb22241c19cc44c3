//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `mailspool_test`)
//!   `TEST_DB_PASSWORD` (default: `mailspool_test`)
//!   `TEST_DB_NAME` (default: `mailspool_test`)

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use mailspool_db::entities::campaign::CampaignStatus;
use mailspool_db::entities::delivery_log::DeliveryStatus;
use mailspool_db::entities::recipient::SubscriptionStatus;
use mailspool_db::entities::{campaign, delivery_log, recipient};
use mailspool_db::repositories::{
    CampaignRepository, ClaimOutcome, DeliveryLogRepository, RecipientRepository,
};
use mailspool_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;

fn new_id() -> String {
    mailspool_common::IdGenerator::new().generate()
}

fn campaign_model(status: CampaignStatus) -> campaign::ActiveModel {
    campaign::ActiveModel {
        id: Set(new_id()),
        name: Set("Integration campaign".to_string()),
        subject: Set("Hello".to_string()),
        content: Set("<p>Hi there</p>".to_string()),
        scheduled_time: Set(Some(Utc::now().into())),
        status: Set(status),
        created_by: Set(None),
        created_at: Set(Utc::now().into()),
    }
}

fn recipient_model(email: &str, status: SubscriptionStatus) -> recipient::ActiveModel {
    recipient::ActiveModel {
        id: Set(new_id()),
        name: Set("Test Recipient".to_string()),
        email: Set(email.to_string()),
        subscription_status: Set(status),
        created_at: Set(Utc::now().into()),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_cleanup() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    let result = db.cleanup().await;
    assert!(result.is_ok(), "Cleanup failed: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_claim_for_delivery_transitions() {
    let db = TestDatabase::create_unique().await.expect("create db");
    let conn = db.connection();
    let repo = CampaignRepository::new(conn);

    let created = repo
        .create(campaign_model(CampaignStatus::Scheduled))
        .await
        .unwrap();

    let first = repo.claim_for_delivery(&created.id).await.unwrap();
    assert_eq!(first, ClaimOutcome::Claimed);

    // A second claim observes in_progress and skips.
    let second = repo.claim_for_delivery(&created.id).await.unwrap();
    assert_eq!(second, ClaimOutcome::AlreadyClaimed);

    let reloaded = repo.get_by_id(&created.id).await.unwrap();
    assert_eq!(reloaded.status, CampaignStatus::InProgress);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_subscribed_keyset_pagination() {
    let db = TestDatabase::create_unique().await.expect("create db");
    let conn = db.connection();
    let repo = RecipientRepository::new(conn);

    for i in 0..5 {
        let status = if i == 2 {
            SubscriptionStatus::Unsubscribed
        } else {
            SubscriptionStatus::Subscribed
        };
        repo.create(recipient_model(&format!("page{i}@example.com"), status))
            .await
            .unwrap();
    }

    assert_eq!(repo.count_subscribed().await.unwrap(), 4);

    let first = repo.subscribed_page_after(None, 3).await.unwrap();
    assert_eq!(first.len(), 3);

    let second = repo
        .subscribed_page_after(first.last().map(String::as_str), 3)
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert!(second[0] > first[2]);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_delivery_log_bulk_insert_and_order() {
    let db = TestDatabase::create_unique().await.expect("create db");
    let conn = db.connection();
    let campaigns = CampaignRepository::new(conn.clone());
    let logs = DeliveryLogRepository::new(conn);

    let campaign = campaigns
        .create(campaign_model(CampaignStatus::InProgress))
        .await
        .unwrap();

    let models: Vec<delivery_log::ActiveModel> = ["zeta@example.com", "alpha@example.com"]
        .iter()
        .map(|email| delivery_log::ActiveModel {
            id: Set(new_id()),
            campaign_id: Set(campaign.id.clone()),
            recipient_id: Set(None),
            recipient_email: Set((*email).to_string()),
            status: Set(DeliveryStatus::Sent),
            failure_reason: Set(None),
            sent_at: Set(Utc::now().into()),
        })
        .collect();

    let inserted = logs.insert_many_ignore_conflicts(models).await.unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(logs.count_for_campaign(&campaign.id).await.unwrap(), 2);

    let ordered = logs.find_for_campaign_by_email(&campaign.id).await.unwrap();
    assert_eq!(ordered[0].recipient_email, "alpha@example.com");
    assert_eq!(ordered[1].recipient_email, "zeta@example.com");

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_database_url_format() {
    let config = TestDbConfig {
        host: "testhost".to_string(),
        port: 5432,
        username: "testuser".to_string(),
        password: "testpass".to_string(),
        database: "testdb".to_string(),
    };

    let url = config.database_url();
    assert!(url.starts_with("postgres://"));
    assert!(url.contains("testhost"));
    assert!(url.contains("5432"));
    assert!(url.contains("testuser"));
    assert!(url.contains("testdb"));
}

#[test]
fn test_postgres_url_format() {
    let config = TestDbConfig::default();
    let url = config.postgres_url();
    assert!(url.ends_with("/postgres"));
}
