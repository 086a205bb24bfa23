//! Digest delivery over SMTP.
//!
//! A digest goes out as one HTML message per recipient. Delivery is
//! best-effort: a failure is logged and the cycle carries on; the stamped
//! `last_alert_at` values are not rolled back.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use stock_common::config::{SmtpConfig, SmtpTls};

use crate::alert::Digest;
use crate::error::MailError;

/// Subject line of every digest.
pub const DIGEST_SUBJECT: &str = "股票价值提醒";

/// Outbound mail seam.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send `body` as HTML to each recipient in turn.
    async fn send_digest(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), MailError>;
}

/// SMTP sender backed by lettre's async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        if config.host.is_empty() {
            return Err(MailError::Config("SMTP host not set".into()));
        }

        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| MailError::Config(format!("Invalid from address: {}", e)))?;

        let host = config.host.as_str();
        let mut builder = match config.tls {
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
        }
        .map_err(|e| MailError::Config(format!("SMTP transport error: {}", e)))?;

        builder = builder.port(config.port);

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send_digest(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        for recipient in recipients {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| MailError::Build(format!("Invalid recipient {}: {}", recipient, e)))?;

            let email = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(subject)
                .header(ContentType::TEXT_HTML)
                .body(body.to_string())
                .map_err(|e| MailError::Build(format!("Failed to build email: {}", e)))?;

            self.transport
                .send(email)
                .await
                .map_err(|e| MailError::Transport(format!("Failed to send email: {}", e)))?;
        }

        Ok(())
    }
}

/// Build the SMTP sender, or `None` when mail is not usable.
pub fn smtp_sender(smtp: &SmtpConfig) -> Option<Arc<dyn MailSender>> {
    if !smtp.is_configured() {
        tracing::warn!("SMTP not configured, digests will only be logged");
        return None;
    }

    match SmtpMailer::new(smtp) {
        Ok(mailer) => Some(Arc::new(mailer) as Arc<dyn MailSender>),
        Err(e) => {
            tracing::warn!(error = %e, "SMTP setup failed, digests will only be logged");
            None
        }
    }
}

/// Hands non-empty digests to the configured sender.
pub struct DigestNotifier {
    sender: Option<Arc<dyn MailSender>>,
    recipients: Vec<String>,
}

impl DigestNotifier {
    pub fn new(sender: Option<Arc<dyn MailSender>>, recipients: Vec<String>) -> Self {
        Self { sender, recipients }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some() && !self.recipients.is_empty()
    }

    /// Send a digest. Returns whether a mail was handed off.
    pub async fn notify(&self, digest: &Digest) -> bool {
        if digest.is_empty() {
            return false;
        }

        let Some(sender) = self.sender.as_ref().filter(|_| !self.recipients.is_empty()) else {
            tracing::warn!(
                tickers = ?digest.touched,
                "Digest ready but mail delivery is not configured"
            );
            return false;
        };

        match sender
            .send_digest(&self.recipients, DIGEST_SUBJECT, &digest.body)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    recipients = self.recipients.len(),
                    count = digest.touched.len(),
                    "Alert digest sent"
                );
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send alert digest");
                false
            }
        }
    }
}
