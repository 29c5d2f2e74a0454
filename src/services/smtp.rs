//! SMTP delivery through lettre's async transport.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use super::notifications::{Notification, Notifier, NotifyError};
use crate::config::EmailConfig;

/// Port 465 speaks TLS from the first byte; every other port upgrades with
/// STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    brand_name: String,
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| NotifyError::Address(format!("{}: {e}", config.from)))?;

        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| NotifyError::Transport(e.to_string()))?
        .port(config.port)
        .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        let builder = if config.username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
        };

        Ok(Self {
            mailer: builder.build(),
            from,
            brand_name: config.brand_name.clone(),
        })
    }

    fn build_message(&self, recipient: &str, notification: &Notification) -> Result<Message, NotifyError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| NotifyError::Address(format!("{recipient}: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject(&self.brand_name))
            .multipart(MultiPart::alternative_plain_html(
                notification.text_body(&self.brand_name),
                notification.html_body(&self.brand_name),
            ))
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.build_message(recipient, notification)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        tracing::info!(recipient = %recipient, kind = notification.kind(), "Email sent");
        Ok(())
    }
}
