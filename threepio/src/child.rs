// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spawns the wrapped test command, injects the IPC path into its
//! environment, and tees its stdout/stderr into the session's raw log
//! independent of the IPC event stream (spec.md §4.5 step 4).

use std::process::Stdio;
use std::sync::Arc;

use camino::Utf8Path;
use threepio_ipc::IPC_PATH_ENV_VAR;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex as AsyncMutex;

use crate::errors::OrchestratorError;

/// Spawns `command` with `THREEPIO_IPC_PATH` set in its environment and
/// its stdio piped so the orchestrator can tee it into `output.log`.
pub fn spawn_child(command: &[String], ipc_path: &Utf8Path) -> Result<Child, OrchestratorError> {
    let (program, args) = command
        .split_first()
        .ok_or(OrchestratorError::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .env(IPC_PATH_ENV_VAR, ipc_path.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    put_in_own_process_group(&mut cmd);

    cmd.spawn().map_err(|error| OrchestratorError::ChildSpawn {
        command: command.to_vec(),
        error,
    })
}

#[cfg(unix)]
fn put_in_own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
fn put_in_own_process_group(_cmd: &mut Command) {
    // Process groups are a Unix concept; on Windows we fall back to
    // best-effort termination of just the child process.
}

/// Streams `reader` into the shared output-log file until EOF.
pub async fn tee_stream(
    mut reader: impl tokio::io::AsyncRead + Unpin,
    log: Arc<AsyncMutex<tokio::fs::File>>,
) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let mut file = log.lock().await;
                if let Err(error) = file.write_all(&buf[..n]).await {
                    tracing::debug!(%error, "failed to write to output.log");
                    break;
                }
            }
            Err(error) => {
                tracing::debug!(%error, "failed to read child output");
                break;
            }
        }
    }
}

/// Forwards a termination request to the child's process group (Unix) or
/// the child process directly (Windows); see spec.md §5 "Cancellation".
#[cfg(unix)]
pub fn forward_terminate(child: &Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(-(pid as libc::pid_t), libc::SIGTERM);
        }
    }
}

#[cfg(windows)]
pub fn forward_terminate(child: &Child) {
    if let Some(pid) = child.id() {
        unsafe {
            winapi_terminate(pid);
        }
    }
}

#[cfg(windows)]
unsafe fn winapi_terminate(_pid: u32) {
    // Best-effort: `Child::start_kill` in the orchestrator handles the
    // force-kill path; Windows has no process-group signal equivalent to
    // SIGTERM, so graceful forwarding is left to the runner's own adapter.
}

/// Force-kills the child outright (used after the grace period elapses),
/// returning its resulting exit status.
pub async fn force_kill(child: &mut Child) -> std::io::Result<std::process::ExitStatus> {
    if let Err(error) = child.start_kill() {
        tracing::debug!(%error, "failed to force-kill child");
    }
    child.wait().await
}
