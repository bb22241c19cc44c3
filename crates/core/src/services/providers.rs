//! Email provider gateway.
//!
//! One send path for the whole pipeline: the hosted API provider is tried
//! first when an API key is configured, SMTP is the fallback (and the only
//! transport otherwise). Reports go out over SMTP with a CSV attachment.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use mailspool_common::{AppError, AppResult, EmailConfig};
use tracing::{debug, info, warn};

const API_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Result of a provider send.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// Whether a transport accepted the message.
    pub success: bool,
    /// Provider status code, when the API transport answered.
    pub status_code: Option<u16>,
}

/// Outbound transport seam for the send workers.
///
/// The pipeline only needs "deliver one message, report the outcome";
/// everything else (transport choice, fallback order) stays inside the
/// implementation.
#[async_trait]
pub trait SendTransport: Send + Sync {
    /// Send one campaign email to a single recipient.
    async fn send(
        &self,
        subject: &str,
        html_body: &str,
        recipient_email: &str,
    ) -> AppResult<SendOutcome>;
}

/// Shared handle to the configured send transport.
pub type TransportHandle = Arc<dyn SendTransport>;

/// Gateway over the configured email transports.
#[derive(Clone)]
pub struct ProviderGateway {
    config: EmailConfig,
    http_client: reqwest::Client,
    smtp: AsyncSmtpTransport<Tokio1Executor>,
}

impl ProviderGateway {
    /// Build the gateway from explicit configuration.
    pub fn new(config: EmailConfig) -> AppResult<Self> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp.host)
                .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?
                .port(config.smtp.port);

        if let (Some(username), Some(password)) =
            (config.smtp.username.clone(), config.smtp.password.clone())
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            config,
            http_client: reqwest::Client::new(),
            smtp: builder.build(),
        })
    }

    /// Label of the primary transport, used to pick the send rate.
    #[must_use]
    pub fn provider_label(&self) -> &'static str {
        if self.config.api_key.is_some() {
            "api"
        } else {
            "smtp"
        }
    }

    /// SMTP relay host the gateway falls back to.
    #[must_use]
    pub fn smtp_host(&self) -> &str {
        &self.config.smtp.host
    }

    /// Send one campaign email.
    ///
    /// The API transport is tried first when configured; any non-2xx answer
    /// falls through to SMTP. An error return means no transport accepted
    /// the message; the caller records it as a failed delivery.
    pub async fn send(
        &self,
        subject: &str,
        html_body: &str,
        recipient_email: &str,
    ) -> AppResult<SendOutcome> {
        if let Some(api_key) = &self.config.api_key {
            match self.send_api(api_key, subject, html_body, recipient_email).await {
                Ok(outcome) if outcome.success => return Ok(outcome),
                Ok(outcome) => {
                    warn!(
                        recipient = %recipient_email,
                        status_code = ?outcome.status_code,
                        "API provider rejected message, falling back to SMTP"
                    );
                }
                Err(e) => {
                    warn!(
                        recipient = %recipient_email,
                        error = %e,
                        "API provider unreachable, falling back to SMTP"
                    );
                }
            }
        }

        self.send_smtp(subject, html_body, recipient_email).await
    }

    /// Send the campaign report to the operator mailbox with a CSV attachment.
    pub async fn send_report(
        &self,
        subject: &str,
        body: &str,
        filename: &str,
        csv_content: Vec<u8>,
    ) -> AppResult<()> {
        let csv_type = ContentType::parse("text/csv")
            .map_err(|e| AppError::Internal(format!("Invalid attachment content type: {e}")))?;

        let message = Message::builder()
            .from(self.from_mailbox()?)
            .to(parse_mailbox(&self.config.report_address)?)
            .subject(subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        Attachment::new(filename.to_string()).body(csv_content, csv_type),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build report email: {e}")))?;

        self.smtp
            .send(message)
            .await
            .map_err(|e| AppError::Provider(format!("Report email send failed: {e}")))?;

        info!(to = %self.config.report_address, "Sent campaign report email");
        Ok(())
    }

    async fn send_api(
        &self,
        api_key: &str,
        subject: &str,
        html_body: &str,
        recipient_email: &str,
    ) -> AppResult<SendOutcome> {
        let payload = serde_json::json!({
            "personalizations": [{
                "to": [{"email": recipient_email}]
            }],
            "from": {
                "email": self.config.from_address,
                "name": self.config.from_name
            },
            "subject": subject,
            "content": [
                {"type": "text/html", "value": html_body}
            ]
        });

        let response = self
            .http_client
            .post(API_SEND_URL)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("API request failed: {e}")))?;

        let status = response.status();
        debug!(recipient = %recipient_email, status = %status, "API provider answered");

        Ok(SendOutcome {
            success: status.is_success(),
            status_code: Some(status.as_u16()),
        })
    }

    async fn send_smtp(
        &self,
        subject: &str,
        html_body: &str,
        recipient_email: &str,
    ) -> AppResult<SendOutcome> {
        let message = Message::builder()
            .from(self.from_mailbox()?)
            .to(parse_mailbox(recipient_email)?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| AppError::Provider(format!("Failed to build email: {e}")))?;

        self.smtp
            .send(message)
            .await
            .map_err(|e| AppError::Provider(format!("SMTP send failed: {e}")))?;

        Ok(SendOutcome {
            success: true,
            status_code: None,
        })
    }

    fn from_mailbox(&self) -> AppResult<Mailbox> {
        let raw = if self.config.from_name.is_empty() {
            self.config.from_address.clone()
        } else {
            format!("{} <{}>", self.config.from_name, self.config.from_address)
        };
        raw.parse()
            .map_err(|e| AppError::Config(format!("Invalid from address: {e}")))
    }
}

#[async_trait]
impl SendTransport for ProviderGateway {
    async fn send(
        &self,
        subject: &str,
        html_body: &str,
        recipient_email: &str,
    ) -> AppResult<SendOutcome> {
        Self::send(self, subject, html_body, recipient_email).await
    }
}

fn parse_mailbox(address: &str) -> AppResult<Mailbox> {
    address
        .parse()
        .map_err(|e| AppError::Provider(format!("Invalid recipient address {address}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailspool_common::SmtpConfig;

    fn test_config(api_key: Option<&str>) -> EmailConfig {
        EmailConfig {
            from_address: "noreply@example.com".to_string(),
            from_name: "Mailspool".to_string(),
            report_address: "ops@example.com".to_string(),
            api_key: api_key.map(String::from),
            smtp: SmtpConfig {
                host: "smtp.example.com".to_string(),
                port: 587,
                username: None,
                password: None,
            },
        }
    }

    #[test]
    fn test_provider_label_follows_api_key() {
        let api = ProviderGateway::new(test_config(Some("sg-key"))).unwrap();
        assert_eq!(api.provider_label(), "api");

        let smtp = ProviderGateway::new(test_config(None)).unwrap();
        assert_eq!(smtp.provider_label(), "smtp");
    }

    #[test]
    fn test_from_mailbox_includes_display_name() {
        let gateway = ProviderGateway::new(test_config(None)).unwrap();
        let mailbox = gateway.from_mailbox().unwrap();
        assert_eq!(mailbox.email.to_string(), "noreply@example.com");
        assert_eq!(mailbox.name.as_deref(), Some("Mailspool"));
    }

    #[test]
    fn test_invalid_recipient_address_is_provider_error() {
        let err = parse_mailbox("not an address").unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }
}
