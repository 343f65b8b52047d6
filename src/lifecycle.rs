//! Signal trapping and teardown.
//!
//! On SIGINT/SIGTERM/SIGQUIT (or a fatal server error) the daemon logs its
//! final stats, stops the pipeline loops, emails the operator once and exits.
//! In-flight tool runs and emails are not waited for unless
//! `lifecycle.drain_timeout_secs` is non-zero.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::notify::operator_exit_email;
use crate::system::ProcessStats;

/// Resolve with the signal name once a termination signal arrives.
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl-C handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = unix_signal(tokio::signal::unix::SignalKind::terminate(), "SIGTERM");
    #[cfg(unix)]
    let quit = unix_signal(tokio::signal::unix::SignalKind::quit(), "SIGQUIT");

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();
    #[cfg(not(unix))]
    let quit = std::future::pending::<&'static str>();

    tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
        name = quit => name,
    }
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind, name: &'static str) -> &'static str {
    match tokio::signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
            name
        }
        Err(e) => {
            error!(signal = name, error = %e, "Failed to install signal handler");
            std::future::pending().await
        }
    }
}

pub struct Lifecycle {
    ctx: AppContext,
}

impl Lifecycle {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Log final stats, stop the pipeline, notify the operator, optionally drain.
    pub async fn teardown(&self, reason: &str) -> ProcessStats {
        info!(%reason, "Shutting down");
        let stats = self.ctx.stats.log_summary("Exiting...");

        self.ctx.cancel.cancel();
        self.notify_operator(reason, &stats).await;
        self.drain().await;
        stats
    }

    async fn notify_operator(&self, reason: &str, stats: &ProcessStats) {
        info!("Sending exit notifier");
        let message = match operator_exit_email(&self.ctx.config.email, reason, stats) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Could not render exit notifier");
                return;
            }
        };
        if let Err(e) = self.ctx.mailer.send(&message).await {
            error!(to = %message.to, error = %e, "Exit notifier failed");
        }
    }

    async fn drain(&self) {
        let tracker = &self.ctx.tracker;
        tracker.close();

        let timeout = Duration::from_secs(self.ctx.config.lifecycle.drain_timeout_secs);
        if timeout.is_zero() {
            if !tracker.is_empty() {
                warn!(in_flight = tracker.len(), "Exiting without waiting for in-flight tasks");
            }
            return;
        }

        match tokio::time::timeout(timeout, tracker.wait()).await {
            Ok(()) => info!("In-flight tasks finished"),
            Err(_) => warn!(
                in_flight = tracker.len(),
                timeout_secs = timeout.as_secs(),
                "Drain timed out, abandoning in-flight tasks"
            ),
        }
    }
}
