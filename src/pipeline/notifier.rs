//! Notifier -- emails the requester once their URL has been tested.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use super::handoff::Inbox;
use crate::config::EmailConfig;
use crate::notify::{completion_email, Mailer};
use crate::queue::TestRequest;

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    email: Arc<EmailConfig>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    inbox: Inbox,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        email: Arc<EmailConfig>,
        max_concurrent: usize,
        tracker: TaskTracker,
        inbox: Inbox,
    ) -> Self {
        Self {
            mailer,
            email,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            tracker,
            inbox,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            max_concurrent = self.permits.available_permits(),
            "Notifier started"
        );

        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = cancel.cancelled() => break,
            };

            let request = tokio::select! {
                request = self.inbox.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
                _ = cancel.cancelled() => break,
            };

            let mailer = Arc::clone(&self.mailer);
            let email = Arc::clone(&self.email);
            self.tracker.spawn(async move {
                notify(mailer.as_ref(), &email, &request).await;
                drop(permit);
            });
        }

        info!("Notifier stopped");
    }
}

/// Send the completion email once; the request is done either way.
async fn notify(mailer: &dyn Mailer, config: &EmailConfig, request: &TestRequest) {
    let message = match completion_email(config, request) {
        Ok(Some(message)) => message,
        Ok(None) => {
            info!(url = %request.target(), "No email address given, nothing to notify");
            return;
        }
        Err(e) => {
            warn!(url = %request.target(), error = %e, "Could not render notification");
            return;
        }
    };

    info!(to = %message.to, url = %request.target(), "Notifying");
    match mailer.send(&message).await {
        Ok(()) => info!(to = %message.to, "Notification sent"),
        Err(e) => warn!(to = %message.to, error = %e, "Notification failed"),
    }
}
