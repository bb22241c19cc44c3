//! Send-batch worker.

use apalis::prelude::*;
use chrono::Utc;
use mailspool_common::{AppError, IdGenerator};
use mailspool_core::{SendTransport as _, TransportHandle};
use mailspool_db::entities::campaign::{self, CampaignStatus};
use mailspool_db::entities::delivery_log::{self, DeliveryStatus};
use mailspool_db::entities::recipient;
use mailspool_db::repositories::{CampaignRepository, DeliveryLogRepository, RecipientRepository};
use sea_orm::{ActiveValue, Set};
use tracing::{debug, error, info, warn};

use crate::jobs::SendBatchJob;

/// Context for the send-batch worker.
#[derive(Clone)]
pub struct SendBatchContext {
    pub campaign_repo: CampaignRepository,
    pub recipient_repo: RecipientRepository,
    pub log_repo: DeliveryLogRepository,
    pub transport: TransportHandle,
    /// Buffered log rows are flushed once this many accumulate.
    pub log_batch: usize,
    pub id_gen: IdGenerator,
}

/// Worker function that delivers one batch of recipients.
///
/// # Errors
/// Returns an error on infrastructure failures (database, transport setup);
/// per-recipient provider rejections are recorded as failed log rows instead.
pub async fn send_batch_worker(job: SendBatchJob, ctx: Data<SendBatchContext>) -> Result<(), Error> {
    debug!(
        campaign_id = %job.campaign_id,
        batch = job.recipient_ids.len(),
        "Sending campaign batch"
    );

    match send_batch(&job, &ctx).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(campaign_id = %job.campaign_id, error = %e, "Failed to send campaign batch");
            Err(Error::Failed(e.into()))
        }
    }
}

async fn send_batch(
    job: &SendBatchJob,
    ctx: &SendBatchContext,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let campaign = match ctx.campaign_repo.get_by_id(&job.campaign_id).await {
        Ok(campaign) => campaign,
        Err(AppError::CampaignNotFound(_)) => {
            warn!(campaign_id = %job.campaign_id, "Campaign no longer exists, skipping batch");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if campaign.status != CampaignStatus::InProgress {
        warn!(
            campaign_id = %job.campaign_id,
            status = campaign.status.as_str(),
            "Campaign is not in progress, skipping batch"
        );
        return Ok(());
    }

    // Recipients deleted since dispatch simply drop out of the batch.
    let recipients = ctx.recipient_repo.find_by_ids(&job.recipient_ids).await?;

    let mut logs: Vec<delivery_log::ActiveModel> = Vec::new();
    let mut sent = 0u64;
    let mut failed = 0u64;

    for recipient in &recipients {
        let row = match attempt_delivery(ctx, &campaign, recipient).await {
            Ok(row) => row,
            Err(e) => {
                // Persist what this run already attempted before handing the
                // job back for retry.
                if let Err(flush_err) = ctx
                    .log_repo
                    .insert_many_ignore_conflicts(std::mem::take(&mut logs))
                    .await
                {
                    warn!(
                        campaign_id = %job.campaign_id,
                        error = %flush_err,
                        "Could not persist buffered delivery logs"
                    );
                }
                return Err(e.into());
            }
        };

        if matches!(row.status, ActiveValue::Set(DeliveryStatus::Sent)) {
            sent += 1;
        } else {
            failed += 1;
        }
        logs.push(row);

        if logs.len() >= ctx.log_batch {
            ctx.log_repo
                .insert_many_ignore_conflicts(std::mem::take(&mut logs))
                .await?;
        }
    }

    ctx.log_repo.insert_many_ignore_conflicts(logs).await?;

    info!(
        campaign_id = %job.campaign_id,
        batch = recipients.len(),
        sent,
        failed,
        "Completed send batch"
    );
    Ok(())
}

/// Attempt delivery to one recipient.
///
/// Each attempt is independent: a provider rejection becomes a failed log
/// row and the batch moves on. Only infrastructure errors bubble up.
async fn attempt_delivery(
    ctx: &SendBatchContext,
    campaign: &campaign::Model,
    recipient: &recipient::Model,
) -> Result<delivery_log::ActiveModel, AppError> {
    match ctx
        .transport
        .send(&campaign.subject, &campaign.content, &recipient.email)
        .await
    {
        Ok(_) => Ok(log_row(
            ctx,
            &campaign.id,
            recipient,
            DeliveryStatus::Sent,
            None,
        )),
        Err(e) if e.is_infrastructure() => Err(e),
        Err(e) => {
            warn!(
                campaign_id = %campaign.id,
                recipient = %recipient.email,
                error = %e,
                "Delivery failed"
            );
            Ok(log_row(
                ctx,
                &campaign.id,
                recipient,
                DeliveryStatus::Failed,
                Some(failure_reason(&e)),
            ))
        }
    }
}

fn log_row(
    ctx: &SendBatchContext,
    campaign_id: &str,
    recipient: &recipient::Model,
    status: DeliveryStatus,
    failure_reason: Option<String>,
) -> delivery_log::ActiveModel {
    delivery_log::ActiveModel {
        id: Set(ctx.id_gen.generate()),
        campaign_id: Set(campaign_id.to_string()),
        recipient_id: Set(Some(recipient.id.clone())),
        recipient_email: Set(recipient.email.clone()),
        status: Set(status),
        failure_reason: Set(failure_reason),
        sent_at: Set(Utc::now().into()),
    }
}

fn failure_reason(error: &AppError) -> String {
    error.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailspool_common::AppResult;
    use mailspool_core::{SendOutcome, SendTransport};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn test_campaign(status: CampaignStatus) -> campaign::Model {
        campaign::Model {
            id: "c1".to_string(),
            name: "Launch".to_string(),
            subject: "Hello".to_string(),
            content: "<p>Hi</p>".to_string(),
            scheduled_time: None,
            status,
            created_by: None,
            created_at: Utc::now().into(),
        }
    }

    fn test_recipient(id: &str, email: &str) -> recipient::Model {
        recipient::Model {
            id: id.to_string(),
            name: "Test Recipient".to_string(),
            email: email.to_string(),
            subscription_status: recipient::SubscriptionStatus::Subscribed,
            created_at: Utc::now().into(),
        }
    }

    /// Transport double: rejects or breaks at scripted addresses, records
    /// every attempt.
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        rejects: Option<String>,
        breaks_at: Option<String>,
        attempts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedTransport {
        async fn attempts(&self) -> Vec<String> {
            self.attempts.lock().await.clone()
        }
    }

    #[async_trait]
    impl SendTransport for ScriptedTransport {
        async fn send(
            &self,
            _subject: &str,
            _html_body: &str,
            recipient_email: &str,
        ) -> AppResult<SendOutcome> {
            self.attempts.lock().await.push(recipient_email.to_string());
            if self.breaks_at.as_deref() == Some(recipient_email) {
                return Err(AppError::Database("connection reset".to_string()));
            }
            if self.rejects.as_deref() == Some(recipient_email) {
                return Err(AppError::Provider("550 mailbox unavailable".to_string()));
            }
            Ok(SendOutcome {
                success: true,
                status_code: Some(202),
            })
        }
    }

    fn context(db: Arc<DatabaseConnection>, transport: &ScriptedTransport) -> SendBatchContext {
        SendBatchContext {
            campaign_repo: CampaignRepository::new(db.clone()),
            recipient_repo: RecipientRepository::new(db.clone()),
            log_repo: DeliveryLogRepository::new(db),
            transport: Arc::new(transport.clone()),
            log_batch: 500,
            id_gen: IdGenerator::new(),
        }
    }

    #[tokio::test]
    async fn test_skips_batch_for_finished_campaign() {
        // Only the campaign lookup may hit the database; any further query
        // would exhaust the mock and panic.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_campaign(CampaignStatus::Completed)]])
                .into_connection(),
        );
        let transport = ScriptedTransport::default();
        let ctx = context(db, &transport);

        send_batch(
            &SendBatchJob::new("c1".to_string(), vec!["r1".to_string()]),
            &ctx,
        )
        .await
        .unwrap();

        assert!(transport.attempts().await.is_empty());
    }

    #[tokio::test]
    async fn test_skips_batch_for_missing_campaign() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<campaign::Model>::new()])
                .into_connection(),
        );
        let transport = ScriptedTransport::default();
        let ctx = context(db, &transport);

        send_batch(
            &SendBatchJob::new("gone".to_string(), vec!["r1".to_string()]),
            &ctx,
        )
        .await
        .unwrap();

        assert!(transport.attempts().await.is_empty());
    }

    #[tokio::test]
    async fn test_one_rejection_still_logs_every_recipient() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_campaign(CampaignStatus::InProgress)]])
                .append_query_results([vec![
                    test_recipient("r1", "alice@example.com"),
                    test_recipient("r2", "bob@example.com"),
                    test_recipient("r3", "carol@example.com"),
                ]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                }])
                .into_connection(),
        );
        let transport = ScriptedTransport {
            rejects: Some("bob@example.com".to_string()),
            ..ScriptedTransport::default()
        };
        let ctx = context(db.clone(), &transport);

        send_batch(
            &SendBatchJob::new(
                "c1".to_string(),
                vec!["r1".to_string(), "r2".to_string(), "r3".to_string()],
            ),
            &ctx,
        )
        .await
        .unwrap();

        // The rejection did not block the remaining recipients.
        assert_eq!(transport.attempts().await.len(), 3);

        // One insert carrying all three rows, the rejected one with its reason.
        drop(ctx);
        let Ok(db) = Arc::try_unwrap(db) else {
            panic!("connection still shared");
        };
        let log = db.into_transaction_log();
        let inserts: Vec<String> = log
            .iter()
            .map(|txn| format!("{txn:?}"))
            .filter(|dump| dump.contains("INSERT"))
            .collect();
        assert_eq!(inserts.len(), 1);
        assert!(inserts[0].contains("alice@example.com"));
        assert!(inserts[0].contains("bob@example.com"));
        assert!(inserts[0].contains("carol@example.com"));
        assert!(inserts[0].contains("550 mailbox unavailable"));
    }

    #[tokio::test]
    async fn test_buffered_rows_are_flushed_before_retryable_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_campaign(CampaignStatus::InProgress)]])
                .append_query_results([vec![
                    test_recipient("r1", "alice@example.com"),
                    test_recipient("r2", "bob@example.com"),
                ]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let transport = ScriptedTransport {
            breaks_at: Some("bob@example.com".to_string()),
            ..ScriptedTransport::default()
        };
        let ctx = context(db.clone(), &transport);

        let result = send_batch(
            &SendBatchJob::new("c1".to_string(), vec!["r1".to_string(), "r2".to_string()]),
            &ctx,
        )
        .await;
        assert!(result.is_err());

        // Alice's outcome was persisted even though the batch aborted.
        drop(ctx);
        let Ok(db) = Arc::try_unwrap(db) else {
            panic!("connection still shared");
        };
        let log = db.into_transaction_log();
        let dump = format!("{log:?}");
        assert!(dump.contains("INSERT"));
        assert!(dump.contains("alice@example.com"));
    }

    #[tokio::test]
    async fn test_attempt_delivery_rejection_becomes_failed_row() {
        let transport = ScriptedTransport {
            rejects: Some("alice@example.com".to_string()),
            ..ScriptedTransport::default()
        };
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let ctx = context(db, &transport);
        let campaign = test_campaign(CampaignStatus::InProgress);

        let row = attempt_delivery(&ctx, &campaign, &test_recipient("r1", "alice@example.com"))
            .await
            .unwrap();
        assert_eq!(row.status, ActiveValue::Set(DeliveryStatus::Failed));
        assert_eq!(
            row.failure_reason,
            ActiveValue::Set(Some("Provider error: 550 mailbox unavailable".to_string()))
        );

        let row = attempt_delivery(&ctx, &campaign, &test_recipient("r2", "bob@example.com"))
            .await
            .unwrap();
        assert_eq!(row.status, ActiveValue::Set(DeliveryStatus::Sent));
        assert_eq!(row.failure_reason, ActiveValue::Set(None));
    }

    #[tokio::test]
    async fn test_attempt_delivery_propagates_infrastructure_errors() {
        let transport = ScriptedTransport {
            breaks_at: Some("alice@example.com".to_string()),
            ..ScriptedTransport::default()
        };
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let ctx = context(db, &transport);
        let campaign = test_campaign(CampaignStatus::InProgress);

        let err = attempt_delivery(&ctx, &campaign, &test_recipient("r1", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_infrastructure());
    }

    #[test]
    fn test_log_row_records_failure_reason() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let ctx = context(db, &ScriptedTransport::default());
        let recipient = test_recipient("r1", "alice@example.com");

        let row = log_row(
            &ctx,
            "c1",
            &recipient,
            DeliveryStatus::Failed,
            Some("mailbox full".to_string()),
        );

        assert_eq!(row.campaign_id, ActiveValue::Set("c1".to_string()));
        assert_eq!(
            row.recipient_email,
            ActiveValue::Set("alice@example.com".to_string())
        );
        assert_eq!(row.status, ActiveValue::Set(DeliveryStatus::Failed));
        assert_eq!(
            row.failure_reason,
            ActiveValue::Set(Some("mailbox full".to_string()))
        );
        if let ActiveValue::Set(id) = &row.id {
            assert_eq!(id.len(), 26);
        } else {
            panic!("id must be set");
        }
    }

    #[test]
    fn test_failure_reason_uses_error_display() {
        let reason = failure_reason(&AppError::Provider("550 mailbox unavailable".to_string()));
        assert_eq!(reason, "Provider error: 550 mailbox unavailable");
    }
}
