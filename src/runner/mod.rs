//! External measurement tool invocation.
//!
//! The dispatcher only needs to know whether a run finished; the tool's own
//! output is captured but not interpreted.

pub mod phantom;

pub use self::phantom::PhantomRunner;

use async_trait::async_trait;
use thiserror::Error;

/// Summary of a finished tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
    pub stdout_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("test tool exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Runs the measurement tool against one URL and waits for it to finish.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn invoke(&self, target: &str) -> Result<RunOutcome, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Records every target it is invoked with.
    #[derive(Default)]
    pub struct MockTestRunner {
        invocations: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl MockTestRunner {
        pub fn new_success() -> Self {
            Self::default()
        }

        pub fn new_failing() -> Self {
            let runner = Self::default();
            runner.set_failing(true);
            runner
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn invocations(&self) -> Vec<String> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TestRunner for MockTestRunner {
        async fn invoke(&self, target: &str) -> Result<RunOutcome, ExecutionError> {
            self.invocations.lock().unwrap().push(target.to_string());
            if self.fail.load(Ordering::SeqCst) {
                return Err(ExecutionError::NonZeroExit {
                    code: Some(1),
                    stderr: "mock failure".to_string(),
                });
            }
            Ok(RunOutcome {
                exit_code: Some(0),
                elapsed_ms: 1,
                stdout_bytes: 0,
            })
        }
    }
}
