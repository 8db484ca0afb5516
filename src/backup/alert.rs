use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailSettings;
use crate::error::AppError;

/// Delivers operator alerts (disk almost full, backup failed).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AppError>;
}

/// Writes alerts to the log only. Used when no SMTP relay is configured.
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AppError> {
        tracing::warn!(subject, "{body}");
        Ok(())
    }
}

/// Sends alerts by e-mail through an SMTP relay.
pub struct EmailAlerter {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

fn parse_mailbox(value: &str) -> Result<Mailbox, AppError> {
    value
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid mail address '{value}': {e}")))
}

impl EmailAlerter {
    /// Returns `None` when no relay host or no recipient is configured.
    pub fn from_settings(settings: &MailSettings) -> Result<Option<Self>, AppError> {
        let Some(host) = settings.smtp_host.as_deref() else {
            return Ok(None);
        };
        if settings.to.is_empty() {
            return Ok(None);
        }

        // 465 is implicit TLS; anything else negotiates STARTTLS.
        let builder = if settings.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| AppError::Config(format!("Invalid SMTP relay '{host}': {e}")))?
        .port(settings.smtp_port);

        let builder = match (&settings.username, &settings.password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => builder,
        };

        let to = settings
            .to
            .iter()
            .map(|address| parse_mailbox(address))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Self {
            transport: builder.build(),
            from: parse_mailbox(&settings.from)?,
            to,
        }))
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message, AppError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!("[CASFOS] {subject}"))
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(body.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to build alert e-mail: {e}")))
    }
}

#[async_trait]
impl Alerter for EmailAlerter {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AppError> {
        let message = self.build_message(subject, body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to send alert e-mail: {e}")))?;
        tracing::info!(subject, recipients = self.to.len(), "Alert e-mail sent");
        Ok(())
    }
}
