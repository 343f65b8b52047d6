//! In-memory deduplicating FIFO of pending test requests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::TestRequest;

/// Outcome of [`IntakeQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request is resident; `position` is the queue size right after admission.
    Admitted { position: usize },
    /// A request for the same URL is already resident; nothing was inserted.
    AlreadyQueued,
}

/// Pending requests in arrival order. At most one resident per URL.
#[derive(Debug, Default)]
pub struct IntakeQueue {
    items: Mutex<VecDeque<TestRequest>>,
    available: Notify,
}

impl IntakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<TestRequest>> {
        // The critical sections never panic mid-update, so a poisoned lock still holds a consistent deque.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admit `request` unless a resident request has the same URL.
    ///
    /// The scan and the insert happen under one lock acquisition, so two
    /// concurrent submissions of the same URL admit exactly one.
    pub fn enqueue(&self, request: TestRequest) -> Admission {
        let position = {
            let mut items = self.items();
            if items.iter().any(|resident| resident.is_duplicate_of(&request)) {
                return Admission::AlreadyQueued;
            }
            items.push_back(request);
            items.len()
        };
        self.available.notify_one();
        Admission::Admitted { position }
    }

    /// Remove and return the oldest resident request.
    pub fn dequeue(&self) -> Option<TestRequest> {
        self.items().pop_front()
    }

    pub fn size(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Wait for the next request. Returns `None` once `cancel` fires.
    ///
    /// Intended for a single consumer. A notification sent while nobody is
    /// waiting is kept as a permit, so an admission racing the emptiness
    /// check is never missed.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<TestRequest> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(request) = self.dequeue() {
                return Some(request);
            }
            tokio::select! {
                _ = self.available.notified() => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }
}
