//! Narrow subprocess interface for external tool invocation.
//!
//! Everything the engine asks of ffmpeg/ffprobe goes through
//! [`ProcessRunner`], so planner and composer logic can be unit-tested
//! against a fake without spawning real processes.

use std::time::Duration;

use async_trait::async_trait;
use beatcut_common::{BeatcutError, BeatcutResult};

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Process exit code (-1 when terminated by signal).
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs an external program to completion and captures its output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> BeatcutResult<RunOutput>;
}

/// Real runner backed by `tokio::process` with a per-invocation timeout.
/// A hung tool is killed and reported as a failure.
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> BeatcutResult<RunOutput> {
        tracing::debug!(program, ?args, "Running external tool");

        let child = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| BeatcutError::render(format!("Failed to start {program}: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                BeatcutError::render(format!(
                    "{program} timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| BeatcutError::render(format!("Failed to wait on {program}: {e}")))?;

        Ok(RunOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Whether a tool responds on this host.
pub async fn tool_available(runner: &dyn ProcessRunner, program: &str) -> bool {
    runner
        .run(program, &["-version".to_string()])
        .await
        .map(|out| out.success())
        .unwrap_or(false)
}
