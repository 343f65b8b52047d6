//! Dispatcher -- runs the external test tool for each request.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use super::handoff::{Handoff, Inbox};
use crate::queue::TestRequest;
use crate::runner::TestRunner;

pub struct Dispatcher {
    runner: Arc<dyn TestRunner>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    inbox: Inbox,
    out: Handoff,
}

impl Dispatcher {
    /// `max_concurrent` bounds simultaneous tool processes.
    pub fn new(
        runner: Arc<dyn TestRunner>,
        max_concurrent: usize,
        tracker: TaskTracker,
        inbox: Inbox,
        out: Handoff,
    ) -> Self {
        Self {
            runner,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            tracker,
            inbox,
            out,
        }
    }

    /// Accept requests as long as a worker slot is free. With every slot busy
    /// nothing is accepted, so the reader waits and requests stay in the intake queue.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            max_concurrent = self.permits.available_permits(),
            "Dispatcher started"
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

            let runner = Arc::clone(&self.runner);
            let out = self.out.clone();
            let cancel = cancel.clone();
            self.tracker.spawn(async move {
                run_test(runner.as_ref(), &request).await;

                // The slot stays taken until the notifier accepts the request.
                tokio::select! {
                    sent = out.send(request) => {
                        if sent.is_err() {
                            warn!("Notifier inbox closed, dropping request");
                        }
                    }
                    _ = cancel.cancelled() => {}
                }
                drop(permit);
            });
        }

        info!("Dispatcher stopped");
    }
}

/// Run the tool once. Failures are logged and otherwise ignored.
async fn run_test(runner: &dyn TestRunner, request: &TestRequest) {
    info!(url = %request.target(), "Testing");
    match runner.invoke(request.target()).await {
        Ok(outcome) => info!(
            url = %request.target(),
            exit_code = ?outcome.exit_code,
            elapsed_ms = outcome.elapsed_ms,
            "Test finished"
        ),
        Err(e) => warn!(url = %request.target(), error = %e, "Test tool failed"),
    }
}
