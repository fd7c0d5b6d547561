//! Subprocess supervision shared by every external-tool processor
//! (converters, OCR, `qpdf` repair): spawn, capture output, enforce a
//! deadline, terminate on expiry. Grounded on the grounding repo's
//! `compute_tools` pattern of driving `tokio::process::Command` under a
//! `tokio::time::timeout`, and on `compute_tools::compute::forward_termination_signal`
//! for shutting a child down with `nix` signals rather than a bare kill.

use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::error::ApiError;

/// How long `terminate` waits after SIGTERM before escalating to SIGKILL.
const TERMINATION_GRACE: Duration = Duration::from_secs(5);

pub struct SubprocessOutput {
    pub status_success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs `cmd` to completion, capturing stdout/stderr, under `deadline`. On
/// expiry the child is sent SIGTERM, given a grace period to exit, and
/// only killed outright if it is still running afterward, then
/// `SubprocessTimeout` is returned.
pub async fn run_with_deadline(
    mut cmd: Command,
    deadline: Duration,
) -> Result<SubprocessOutput, ApiError> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .map_err(|e| ApiError::subprocess_failed(format!("failed to spawn subprocess: {e}")))?;

    let mut stdout_pipe = child.stdout.take().expect("stdout is piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr is piped");

    let collect = async {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut stdout).await;
        let _ = stderr_pipe.read_to_end(&mut stderr).await;
        let status = child.wait().await;
        (status, stdout, stderr)
    };

    match tokio::time::timeout(deadline, collect).await {
        Ok((status, stdout, stderr)) => {
            let status = status
                .map_err(|e| ApiError::subprocess_failed(format!("wait failed: {e}")))?;
            Ok(SubprocessOutput {
                status_success: status.success(),
                stdout,
                stderr,
            })
        }
        Err(_elapsed) => {
            terminate(&mut child).await;
            Err(ApiError::subprocess_timeout("processing deadline expired"))
        }
    }
}

/// Asks `child` to exit via SIGTERM, waits up to [`TERMINATION_GRACE`] for
/// it to do so, then escalates to SIGKILL if it is still alive.
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        if tokio::time::timeout(TERMINATION_GRACE, child.wait())
            .await
            .is_ok()
        {
            return;
        }
    }

    let _ = child.kill().await;
    let _ = child.wait().await;
}

/// Bounds a `SubprocessOutput` into a `Result`, surfacing stderr (truncated)
/// in the internal error message for diagnostics, never in the HTTP body.
pub fn require_success(output: SubprocessOutput, tool: &str) -> Result<SubprocessOutput, ApiError> {
    if output.status_success {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let truncated: String = stderr.chars().take(2000).collect();
        Err(ApiError::subprocess_failed(format!("{tool} failed: {truncated}")))
    }
}
