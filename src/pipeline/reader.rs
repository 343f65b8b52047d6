//! Queue reader -- drains the intake queue into the dispatcher.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::handoff::Handoff;
use crate::queue::{IntakeQueue, TestRequest};
use crate::store::RequestStore;

pub struct QueueReader {
    queue: Arc<IntakeQueue>,
    store: Arc<dyn RequestStore>,
    tracker: TaskTracker,
    out: Handoff,
}

impl QueueReader {
    pub fn new(
        queue: Arc<IntakeQueue>,
        store: Arc<dyn RequestStore>,
        tracker: TaskTracker,
        out: Handoff,
    ) -> Self {
        Self {
            queue,
            store,
            tracker,
            out,
        }
    }

    /// Dequeue one request at a time, record it, and hand it to the dispatcher.
    ///
    /// The next dequeue waits until the dispatcher has accepted the current
    /// request; that wait is what throttles intake when testing is saturated.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Queue reader started");

        while let Some(request) = self.queue.next(&cancel).await {
            info!(url = %request.target(), email = ?request.email(), "Request dequeued");
            self.persist(&request);

            tokio::select! {
                sent = self.out.send(request) => {
                    if sent.is_err() {
                        warn!("Dispatcher inbox closed, queue reader stopping");
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        info!("Queue reader stopped");
    }

    /// Fire-and-forget save; the outcome is only logged.
    fn persist(&self, request: &TestRequest) {
        let store = Arc::clone(&self.store);
        let request = request.clone();
        self.tracker.spawn(async move {
            match store.save(&request).await {
                Ok(()) => debug!(url = %request.target(), "Request saved"),
                Err(e) => warn!(url = %request.target(), error = %e, "Error saving request"),
            }
        });
    }
}
