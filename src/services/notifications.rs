//! Outbound messages for the password reset flow.
//!
//! A [`Notifier`] delivers a [`Notification`] to one recipient address. The
//! SMTP implementation lives in [`super::smtp`]; [`LogNotifier`] is used when
//! email delivery is disabled.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Otp;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("Delivery failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Carries a freshly issued reset code.
    ResetCode {
        username: String,
        otp: Otp,
        expires_in_minutes: u32,
    },
    /// Sent after the password was changed.
    ResetConfirmation { username: String },
}

impl Notification {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ResetCode { .. } => "reset_code",
            Self::ResetConfirmation { .. } => "reset_confirmation",
        }
    }

    #[must_use]
    pub fn subject(&self, brand: &str) -> String {
        match self {
            Self::ResetCode { .. } => format!("Password Reset OTP - {brand}"),
            Self::ResetConfirmation { .. } => format!("Password Reset Successful - {brand}"),
        }
    }

    #[must_use]
    pub fn text_body(&self, brand: &str) -> String {
        match self {
            Self::ResetCode {
                username,
                otp,
                expires_in_minutes,
            } => format!(
                "Hello {username},\n\n\
                 You requested to reset your password for the {brand} admin panel.\n\n\
                 Your one-time code is: {code}\n\n\
                 This code expires in {expires_in_minutes} minutes. Do not share it with anyone.\n\n\
                 If you did not request a password reset, you can ignore this email. \
                 Your password will not change.\n\n\
                 {brand}",
                code = otp.as_str(),
            ),
            Self::ResetConfirmation { username } => format!(
                "Hello {username},\n\n\
                 Your password for the {brand} admin panel has been reset successfully.\n\n\
                 If you did not make this change, contact support immediately.\n\n\
                 {brand}"
            ),
        }
    }

    #[must_use]
    pub fn html_body(&self, brand: &str) -> String {
        let brand = html_escape::encode_text(brand);

        let content = match self {
            Self::ResetCode {
                username,
                otp,
                expires_in_minutes,
            } => format!(
                r#"<p>Hello {username},</p>
<p>You requested to reset your password for the {brand} admin panel.</p>
<p style="font-size:28px;font-weight:bold;letter-spacing:6px;text-align:center;padding:16px;background:#f4f4f4;border-radius:6px;">{code}</p>
<p>This code expires in <strong>{expires_in_minutes} minutes</strong>. Do not share it with anyone.</p>
<p style="color:#666;">If you did not request a password reset, you can ignore this email. Your password will not change.</p>"#,
                username = html_escape::encode_text(username),
                code = html_escape::encode_text(otp.as_str()),
            ),
            Self::ResetConfirmation { username } => format!(
                r#"<p>Hello {username},</p>
<p>Your password for the {brand} admin panel has been reset successfully.</p>
<p style="color:#666;">If you did not make this change, contact support immediately.</p>"#,
                username = html_escape::encode_text(username),
            ),
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<body style="font-family:Arial,sans-serif;color:#333;max-width:600px;margin:0 auto;padding:20px;">
<h2 style="color:#2c3e50;">{brand}</h2>
{content}
</body>
</html>"#
        )
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes a summary of each message to the log instead of delivering it.
/// The reset code itself is never logged.
pub struct LogNotifier {
    brand_name: String,
}

impl LogNotifier {
    #[must_use]
    pub fn new(brand_name: impl Into<String>) -> Self {
        Self {
            brand_name: brand_name.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %recipient,
            kind = notification.kind(),
            subject = %notification.subject(&self.brand_name),
            "Email delivery disabled; message not sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset_code() -> Notification {
        Notification::ResetCode {
            username: "admin".to_string(),
            otp: Otp::new("048213"),
            expires_in_minutes: 10,
        }
    }

    #[test]
    fn reset_code_bodies_carry_code_and_window() {
        let n = reset_code();
        assert_eq!(n.subject("Acme"), "Password Reset OTP - Acme");

        let text = n.text_body("Acme");
        assert!(text.contains("048213"));
        assert!(text.contains("10 minutes"));

        let html = n.html_body("Acme");
        assert!(html.contains("048213"));
        assert!(html.contains("<h2 style=\"color:#2c3e50;\">Acme</h2>"));
    }

    #[test]
    fn html_escapes_user_controlled_text() {
        let n = Notification::ResetConfirmation {
            username: "<script>".to_string(),
        };
        let html = n.html_body("A & B");
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("A &amp; B"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn debug_output_hides_code() {
        let rendered = format!("{:?}", reset_code());
        assert!(!rendered.contains("048213"));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier::new("Acme");
        assert!(notifier.send("a@example.com", &reset_code()).await.is_ok());
    }
}
