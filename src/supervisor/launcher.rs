//! Process launcher (spec.md §4.9 "process launcher").
//!
//! Resolves the executable and argument vector, injects the configured
//! environment overlay plus the gateway base URL, and spawns the child
//! with piped stdout/stderr so [`super::logbuffer::LogBuffer`] can capture
//! both streams line-by-line.

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::supervisor::logbuffer::{LogBuffer, StreamTag};

/// The variable name set in the child's environment, naming the gateway's
/// base URL (spec.md §6, "Environment injection to the child process").
pub const GATEWAY_BASE_URL_VAR: &str = "GATEWAY_BASE_URL";

pub struct LaunchedProcess {
    pub child: Child,
    pub pid: Option<u32>,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
}

impl LaunchedProcess {
    /// Aborts the capture tasks and kills the child. Called before a fresh
    /// spawn on restart, and on explicit `stop()` (§4.9, "Resource hygiene
    /// on restart").
    pub async fn teardown(mut self) {
        self.stdout_task.abort();
        self.stderr_task.abort();
        let _ = self.child.kill().await;
    }
}

/// Spawns the configured executable with the environment overlay plus the
/// gateway base URL injected, wiring both standard streams into `buffer`.
pub fn spawn(
    config: &SupervisorConfig,
    gateway_base_url: &str,
    buffer: Arc<LogBuffer>,
) -> Result<LaunchedProcess, SupervisorError> {
    let mut command = Command::new(&config.executable_path);
    command
        .args(&config.argument_vector)
        .envs(&config.environment_overlay)
        .env(GATEWAY_BASE_URL_VAR, gateway_base_url)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(SupervisorError::SpawnFailed)?;
    let pid = child.id();

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let stdout_buffer = Arc::clone(&buffer);
    let stdout_task = tokio::spawn(async move {
        capture_stream(stdout, StreamTag::Stdout, stdout_buffer).await;
    });
    let stderr_buffer = Arc::clone(&buffer);
    let stderr_task = tokio::spawn(async move {
        capture_stream(stderr, StreamTag::Stderr, stderr_buffer).await;
    });

    Ok(LaunchedProcess {
        child,
        pid,
        stdout_task,
        stderr_task,
    })
}

async fn capture_stream<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    tag: StreamTag,
    buffer: Arc<LogBuffer>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => buffer.append(tag, line),
            Ok(None) => break,
            Err(err) => {
                log::warn!("log capture stream ended with an error: {err}");
                break;
            }
        }
    }
}
