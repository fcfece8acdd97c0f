//! Email channel: async SMTP sending via lettre.
//!
//! Works with Gmail (SMTPS on 465, app password), Outlook and custom relays
//! (STARTTLS on 587 with `implicit_tls = false`).

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor};
use pulse_core::config::EmailConfig;
use pulse_core::error::{PulseError, Result};
use pulse_core::traits::mailer::{Mailer, OutgoingEmail};
use std::sync::Mutex;

/// SMTP mailer. One transport is built up front and reused for every send.
pub struct EmailChannel {
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailChannel {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        if config.sender.is_empty() || config.password.is_empty() {
            return Err(PulseError::Config(
                "SMTP credentials missing (email.sender / email.password \
                 or EMAIL_SENDER / EMAIL_PASSWORD)"
                    .into(),
            ));
        }

        let from: Mailbox = format!("{} <{}>", config.display_name, config.sender)
            .parse()
            .map_err(|e| PulseError::Config(format!("Invalid sender: {e}")))?;

        let creds = Credentials::new(config.sender.clone(), config.password.clone());

        let builder = if config.implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| PulseError::Config(format!("SMTP relay: {e}")))?;

        let mailer = builder.port(config.smtp_port).credentials(creds).build();

        Ok(Self { from, mailer })
    }
}

/// Build the MIME message for one send.
fn build_message(from: &Mailbox, email: &OutgoingEmail) -> Result<LettreMessage> {
    let to: Mailbox = email.to.parse().map_err(|e| PulseError::DeliveryFailed {
        to: email.to.clone(),
        reason: format!("Invalid to: {e}"),
    })?;

    LettreMessage::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_HTML)
        .body(email.html_body.clone())
        .map_err(|e| PulseError::DeliveryFailed {
            to: email.to.clone(),
            reason: format!("Build email: {e}"),
        })
}

#[async_trait]
impl Mailer for EmailChannel {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = build_message(&self.from, email)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| PulseError::DeliveryFailed {
                to: email.to.clone(),
                reason: format!("SMTP send: {e}"),
            })?;

        tracing::info!("📧 Email sent to {}", email.to);
        Ok(())
    }
}

/// Dry-run mailer: logs and records messages instead of sending them.
#[derive(Default)]
pub struct LogMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        tracing::info!("📭 [dry-run] {} ← {}", email.to, email.subject);
        self.sent
            .lock()
            .map_err(|e| PulseError::DeliveryFailed {
                to: email.to.clone(),
                reason: e.to_string(),
            })?
            .push(email.clone());
        Ok(())
    }
}
