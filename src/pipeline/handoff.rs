//! Rendezvous between two stages.
//!
//! `Handoff::send` resolves only once the receiving stage has taken the
//! request out of its `Inbox`, so a producer never runs ahead of its consumer.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::queue::TestRequest;

type Envelope = (TestRequest, oneshot::Sender<()>);

/// The receiving stage is gone.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("receiving stage has stopped")]
pub struct HandoffClosed;

/// Create a connected producer/consumer pair.
pub fn channel() -> (Handoff, Inbox) {
    let (tx, rx) = mpsc::channel(1);
    (Handoff { tx }, Inbox { rx })
}

#[derive(Debug, Clone)]
pub struct Handoff {
    tx: mpsc::Sender<Envelope>,
}

impl Handoff {
    /// Hand `request` over and wait until the consumer has accepted it.
    pub async fn send(&self, request: TestRequest) -> Result<(), HandoffClosed> {
        let (ack, accepted) = oneshot::channel();
        self.tx
            .send((request, ack))
            .await
            .map_err(|_| HandoffClosed)?;
        accepted.await.map_err(|_| HandoffClosed)
    }
}

#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::Receiver<Envelope>,
}

impl Inbox {
    /// Accept the next request, releasing its producer. Cancel safe.
    pub async fn recv(&mut self) -> Option<TestRequest> {
        let (request, ack) = self.rx.recv().await?;
        // A producer that stopped waiting has been cancelled; the request is still ours.
        let _ = ack.send(());
        Some(request)
    }
}
