// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process termination helpers (§4.4 "SIGTERM then SIGKILL after a grace
//! window"). Signaling shells out to the system `kill` binary rather than
//! pulling in a signals crate, matching how the admin CLI already
//! terminates the daemon process.

use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::warn;

use crate::error::AgentError;

/// Send `SIGTERM` to `pid`.
pub fn terminate(pid: u32) -> Result<(), AgentError> {
    send_signal("-15", pid)
}

/// Send `SIGKILL` to `pid`.
pub fn kill(pid: u32) -> Result<(), AgentError> {
    send_signal("-9", pid)
}

/// `true` if a process with `pid` is still alive (`kill -0`).
pub fn is_alive(pid: u32) -> bool {
    send_signal("-0", pid).is_ok()
}

fn send_signal(signal: &str, pid: u32) -> Result<(), AgentError> {
    let status = Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| AgentError::SignalFailed { pid, source })?;

    if status.success() || signal == "-0" {
        Ok(())
    } else {
        Err(AgentError::SignalFailed {
            pid,
            source: std::io::Error::other(format!("kill {signal} {pid} exited with {status}")),
        })
    }
}

/// SIGTERM `pid`, then poll for exit every 50ms up to `grace`. If the
/// process is still alive once the grace window elapses, SIGKILL it.
/// Idempotent: a process that is already gone is not an error.
pub async fn terminate_with_grace(pid: u32, grace: Duration) {
    if !is_alive(pid) {
        return;
    }
    if let Err(e) = terminate(pid) {
        warn!(pid, error = %e, "SIGTERM failed, proceeding to SIGKILL");
    }

    let deadline = tokio::time::Instant::now() + grace;
    while tokio::time::Instant::now() < deadline {
        if !is_alive(pid) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    if is_alive(pid) {
        if let Err(e) = kill(pid) {
            warn!(pid, error = %e, "SIGKILL failed");
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
