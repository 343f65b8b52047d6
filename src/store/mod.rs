//! Best-effort record of submitted requests in a remote store.

pub mod usergrid;

pub use self::usergrid::UsergridStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::queue::TestRequest;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("store authentication failed: {0}")]
    Auth(String),
}

/// Persists a submitted request. Callers treat failures as log-only.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn save(&self, request: &TestRequest) -> Result<(), StoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Records `(url, email)` for every save.
    #[derive(Default)]
    pub struct MockStore {
        saved: Mutex<Vec<(String, Option<String>)>>,
        fail: AtomicBool,
    }

    impl MockStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn new_failing() -> Self {
            let store = Self::default();
            store.fail.store(true, Ordering::SeqCst);
            store
        }

        pub fn saved(&self) -> Vec<(String, Option<String>)> {
            self.saved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RequestStore for MockStore {
        async fn save(&self, request: &TestRequest) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Auth("mock store rejects all writes".to_string()));
            }
            self.saved.lock().unwrap().push((
                request.target().to_string(),
                request.email().map(str::to_string),
            ));
            Ok(())
        }
    }
}
