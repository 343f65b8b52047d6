//! The intake -> dispatch -> notify pipeline.
//!
//! Three long-lived loops joined by rendezvous handoffs. Each loop blocks
//! (no polling) until it has work or the shared cancellation token fires.
//! Per-request work runs as tracked tasks bounded by per-stage semaphores.

pub mod dispatcher;
pub mod handoff;
pub mod notifier;
pub mod reader;

pub use self::dispatcher::Dispatcher;
pub use self::notifier::Notifier;
pub use self::reader::QueueReader;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::context::AppContext;

/// Handles to the three stage loops.
pub struct Pipeline {
    reader: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    notifier: JoinHandle<()>,
}

impl Pipeline {
    /// Wire the stages together and start them on the context's tracker.
    pub fn spawn(ctx: &AppContext) -> Self {
        let (to_dispatcher, dispatcher_inbox) = handoff::channel();
        let (to_notifier, notifier_inbox) = handoff::channel();

        let reader = QueueReader::new(
            Arc::clone(&ctx.queue),
            Arc::clone(&ctx.store),
            ctx.tracker.clone(),
            to_dispatcher,
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&ctx.runner),
            ctx.config.pipeline.max_concurrent_tests,
            ctx.tracker.clone(),
            dispatcher_inbox,
            to_notifier,
        );
        let notifier = Notifier::new(
            Arc::clone(&ctx.mailer),
            Arc::new(ctx.config.email.clone()),
            ctx.config.pipeline.max_concurrent_emails,
            ctx.tracker.clone(),
            notifier_inbox,
        );

        Self {
            reader: ctx.tracker.spawn(reader.run(ctx.cancel.clone())),
            dispatcher: ctx.tracker.spawn(dispatcher.run(ctx.cancel.clone())),
            notifier: ctx.tracker.spawn(notifier.run(ctx.cancel.clone())),
        }
    }

    /// Wait for all three loops to return (after cancellation).
    pub async fn join(self) {
        for (stage, handle) in [
            ("reader", self.reader),
            ("dispatcher", self.dispatcher),
            ("notifier", self.notifier),
        ] {
            if let Err(e) = handle.await {
                tracing::error!(stage, error = %e, "Pipeline stage ended abnormally");
            }
        }
    }
}
