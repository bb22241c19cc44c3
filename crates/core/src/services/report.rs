//! Campaign delivery report generation.

use chrono_tz::Tz;
use futures::TryStreamExt;
use mailspool_common::{AppError, AppResult};
use mailspool_db::repositories::{CampaignRepository, DeliveryLogRepository};
use sea_orm::prelude::DateTimeWithTimeZone;
use tracing::info;

use crate::services::providers::ProviderGateway;

/// Service that renders and mails per-campaign delivery reports.
#[derive(Clone)]
pub struct ReportService {
    campaign_repo: CampaignRepository,
    log_repo: DeliveryLogRepository,
    gateway: ProviderGateway,
    timezone: Tz,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub const fn new(
        campaign_repo: CampaignRepository,
        log_repo: DeliveryLogRepository,
        gateway: ProviderGateway,
        timezone: Tz,
    ) -> Self {
        Self {
            campaign_repo,
            log_repo,
            gateway,
            timezone,
        }
    }

    /// Render the CSV report for a campaign.
    ///
    /// Streams delivery logs ordered by recipient email; the full result set
    /// is never held in memory. Returns the CSV bytes and the row count.
    pub async fn build_csv(&self, campaign_id: &str) -> AppResult<(Vec<u8>, u64)> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["recipient_email", "status", "failure_reason", "sent_at"])
            .map_err(|e| AppError::Internal(format!("Failed to write CSV header: {e}")))?;

        let mut rows = 0u64;
        let mut stream = self.log_repo.stream_for_campaign_by_email(campaign_id).await?;

        while let Some(log) = stream
            .try_next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            writer
                .write_record([
                    log.recipient_email.as_str(),
                    log.status.as_str(),
                    log.failure_reason.as_deref().unwrap_or(""),
                    &format_sent_at(&log.sent_at, self.timezone),
                ])
                .map_err(|e| AppError::Internal(format!("Failed to write CSV row: {e}")))?;
            rows += 1;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Internal(format!("Failed to flush CSV buffer: {e}")))?;

        Ok((bytes, rows))
    }

    /// Build the report and mail it to the operator address.
    ///
    /// A campaign with zero delivery logs still produces a (header-only)
    /// report. Returns the number of data rows.
    pub async fn send_report(&self, campaign_id: &str) -> AppResult<u64> {
        let campaign = self.campaign_repo.get_by_id(campaign_id).await?;
        let (csv_content, rows) = self.build_csv(campaign_id).await?;

        let subject = format!("Campaign Report: {}", campaign.name);
        let body = format!(
            "Attached is the delivery report for campaign '{}'.",
            campaign.name
        );
        let filename = format!("{}_report.csv", campaign.name);

        self.gateway
            .send_report(&subject, &body, &filename, csv_content)
            .await?;

        info!(campaign_id = %campaign_id, rows, "Campaign report sent");
        Ok(rows)
    }
}

/// Format a send timestamp in the report time zone as `dd/mm/yyyy HH:MM:SS`.
fn format_sent_at(sent_at: &DateTimeWithTimeZone, tz: Tz) -> String {
    sent_at
        .with_timezone(&tz)
        .format("%d/%m/%Y %H:%M:%S")
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mailspool_common::{EmailConfig, SmtpConfig};
    use mailspool_db::entities::delivery_log::{self, DeliveryStatus};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn test_gateway() -> ProviderGateway {
        ProviderGateway::new(EmailConfig {
            from_address: "noreply@example.com".to_string(),
            from_name: String::new(),
            report_address: "ops@example.com".to_string(),
            api_key: None,
            smtp: SmtpConfig {
                host: "smtp.example.com".to_string(),
                port: 587,
                username: None,
                password: None,
            },
        })
        .unwrap()
    }

    fn test_log(email: &str, status: DeliveryStatus, reason: Option<&str>) -> delivery_log::Model {
        delivery_log::Model {
            id: format!("log-{email}"),
            campaign_id: "c1".to_string(),
            recipient_id: None,
            recipient_email: email.to_string(),
            status,
            failure_reason: reason.map(String::from),
            sent_at: Utc.with_ymd_and_hms(2026, 1, 5, 10, 30, 0).unwrap().into(),
        }
    }

    #[test]
    fn test_format_sent_at_converts_timezone() {
        let utc: DateTimeWithTimeZone =
            Utc.with_ymd_and_hms(2026, 1, 5, 10, 30, 0).unwrap().into();

        assert_eq!(
            format_sent_at(&utc, chrono_tz::Asia::Kolkata),
            "05/01/2026 16:00:00"
        );
        assert_eq!(format_sent_at(&utc, chrono_tz::UTC), "05/01/2026 10:30:00");
    }

    #[tokio::test]
    async fn test_build_csv_rows_and_header() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    test_log("alpha@example.com", DeliveryStatus::Sent, None),
                    test_log("beta@example.com", DeliveryStatus::Failed, Some("bounced")),
                ]])
                .into_connection(),
        );

        let service = ReportService::new(
            CampaignRepository::new(db.clone()),
            DeliveryLogRepository::new(db),
            test_gateway(),
            chrono_tz::UTC,
        );

        let (bytes, rows) = service.build_csv("c1").await.unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "recipient_email,status,failure_reason,sent_at"
        );
        assert_eq!(
            lines.next().unwrap(),
            "alpha@example.com,sent,,05/01/2026 10:30:00"
        );
        assert_eq!(
            lines.next().unwrap(),
            "beta@example.com,failed,bounced,05/01/2026 10:30:00"
        );
    }
}
