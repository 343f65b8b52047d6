//! Completion and operator email: message assembly and delivery.

pub mod smtp;
pub mod templates;

pub use self::smtp::SmtpMailer;

use askama::Template;
use async_trait::async_trait;
use thiserror::Error;

use self::templates::{CompletionBody, OperatorExitBody};
use crate::config::EmailConfig;
use crate::queue::TestRequest;
use crate::system::ProcessStats;

#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Build(String),

    #[error("template render error: {0}")]
    Render(#[from] askama::Error),
}

/// A rendered plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers one message. No retries; the caller decides what a failure means.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
}

/// The "your results are ready" message for `request`.
///
/// Returns `Ok(None)` when the requester left no address.
pub fn completion_email(
    config: &EmailConfig,
    request: &TestRequest,
) -> Result<Option<OutgoingEmail>, EmailError> {
    let Some(to) = request.email() else {
        return Ok(None);
    };
    let body = CompletionBody::new(request.target()).render()?;
    Ok(Some(OutgoingEmail {
        from: config.from_address.clone(),
        to: to.to_string(),
        subject: config.completion_subject.clone(),
        body,
    }))
}

/// The notice sent to the operator when the daemon goes down.
pub fn operator_exit_email(
    config: &EmailConfig,
    reason: &str,
    stats: &ProcessStats,
) -> Result<OutgoingEmail, EmailError> {
    let summary = stats.summary();
    let body = OperatorExitBody {
        reason,
        stats: &summary,
        queue_depth: stats.queue_depth,
    }
    .render()?;
    Ok(OutgoingEmail {
        from: config.from_address.clone(),
        to: config.operator_address.clone(),
        subject: config.operator_subject.clone(),
        body,
    })
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Keeps every message it is asked to send.
    #[derive(Default)]
    pub struct MockMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail: AtomicBool,
    }

    impl MockMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn new_failing() -> Self {
            let mailer = Self::default();
            mailer.fail.store(true, Ordering::SeqCst);
            mailer
        }

        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
            // Failed attempts are recorded too, so tests can count attempts.
            self.sent.lock().unwrap().push(email.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(EmailError::Build("mock mailer refuses to send".to_string()));
            }
            Ok(())
        }
    }
}
