//! PhantomJS process wrapper -- spawn the speed report script, wait, capture output.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{ExecutionError, RunOutcome, TestRunner};
use crate::config::ToolConfig;

/// Runs `<executable> <script> --url=<target>`.
#[derive(Debug, Clone)]
pub struct PhantomRunner {
    executable: PathBuf,
    script: PathBuf,
}

impl PhantomRunner {
    pub fn new(executable: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            script: script.into(),
        }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config.executable.clone(), config.script.clone())
    }

    fn command(&self, target: &str) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(&self.script)
            .arg(format!("--url={target}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        cmd
    }
}

#[async_trait]
impl TestRunner for PhantomRunner {
    async fn invoke(&self, target: &str) -> Result<RunOutcome, ExecutionError> {
        let start = Instant::now();
        let output = self
            .command(target)
            .output()
            .await
            .map_err(|source| ExecutionError::Spawn {
                program: self.executable.display().to_string(),
                source,
            })?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if !output.status.success() {
            return Err(ExecutionError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(url = %target, stdout_bytes = output.stdout.len(), "Test tool output discarded");

        Ok(RunOutcome {
            exit_code: output.status.code(),
            elapsed_ms,
            stdout_bytes: output.stdout.len(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_script_and_url_arguments() {
        // `echo` prints its arguments, so stdout is "<script> --url=<target>\n".
        let runner = PhantomRunner::new("echo", "speedreport.js");
        let outcome = runner.invoke("http://example.com").await.unwrap();
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(
            outcome.stdout_bytes,
            "speedreport.js --url=http://example.com\n".len()
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let runner = PhantomRunner::new("false", "ignored.js");
        let err = runner.invoke("http://example.com").await.unwrap_err();
        assert!(matches!(err, ExecutionError::NonZeroExit { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let runner = PhantomRunner::new("/nonexistent/phantomjs-speedreport", "x.js");
        let err = runner.invoke("http://example.com").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn { .. }));
    }
}
