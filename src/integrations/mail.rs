use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use crate::config::SmtpConfig;
use crate::error::AppError;

/// A plain-text message for the staff inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), AppError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipient: Mailbox,
}

fn parse_mailbox(value: &str, what: &str) -> Result<Mailbox, AppError> {
    value
        .parse::<Mailbox>()
        .map_err(|e| AppError::Internal(format!("parse {} email: {}", what, e)))
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, AppError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::Internal(format!("create SMTP transport: {}", e)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            sender: parse_mailbox(&config.sender, "sender")?,
            recipient: parse_mailbox(&config.recipient, "recipient")?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip_all, fields(subject = %notification.subject))]
    async fn send(&self, notification: Notification) -> Result<(), AppError> {
        let message = Message::builder()
            .from(self.sender.clone())
            .to(self.recipient.clone())
            .subject(notification.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body)
            .map_err(|e| AppError::Internal(format!("build email message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::ExternalService(format!("send SMTP email: {}", e)))?;

        info!("Notification email sent");
        Ok(())
    }
}
