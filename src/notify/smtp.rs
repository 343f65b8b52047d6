//! SMTP delivery through lettre's async transport.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use super::{EmailError, Mailer, OutgoingEmail};
use crate::config::EmailConfig;

/// STARTTLS relay with the configured account. The transport is built once and shared.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { transport })
    }
}

/// Assemble the MIME message for `email`.
pub fn build_message(email: &OutgoingEmail) -> Result<Message, EmailError> {
    Message::builder()
        .from(email.from.parse()?)
        .to(email.to.parse()?)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| EmailError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let message = build_message(email)?;
        self.transport.send(message).await?;
        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            from: "speedreport@fasterness.com".to_string(),
            to: to.to_string(),
            subject: "subject".to_string(),
            body: "body".to_string(),
        }
    }

    #[test]
    fn test_build_message_headers() {
        let message = build_message(&email("a@b.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("From: speedreport@fasterness.com"));
        assert!(raw.contains("To: a@b.com"));
        assert!(raw.contains("Subject: subject"));
    }

    #[test]
    fn test_bad_recipient_is_address_error() {
        let err = build_message(&email("not-an-email")).unwrap_err();
        assert!(matches!(err, EmailError::Address(_)));
        assert!(err.to_string().contains("email address parse error"));
    }
}
