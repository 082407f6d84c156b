// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-lifecycle plumbing shared by `start`/`stop`/`restart`/`status`.
//!
//! The admin CLI never speaks the gateway's wire protocol (§1.1: "no
//! project/client surface") — it only ever spawns `gwyd`, reads its pid
//! file, signals it, and probes whether the bound TCP port accepts
//! connections.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

/// Locate the `gwyd` binary: explicit override, then a debug-build sibling
/// (so `cargo run -p gwy` finds the daemon built alongside it), then the
/// binary's own sibling directory, then `PATH`.
pub fn find_gwyd_binary() -> PathBuf {
    if let Some(path) = crate::env::daemon_binary() {
        return PathBuf::from(path);
    }

    let current_exe = std::env::current_exe().ok();
    let is_debug_build =
        current_exe.as_ref().and_then(|p| p.to_str()).map(|s| s.contains("target/debug")).unwrap_or(false);

    if is_debug_build {
        if let Some(manifest_dir) = crate::env::cargo_manifest_dir() {
            let dev_path =
                PathBuf::from(manifest_dir).parent().and_then(|p| p.parent()).map(|p| p.join("target/debug/gwyd"));
            if let Some(path) = dev_path {
                if path.exists() {
                    return path;
                }
            }
        }
    }

    if let Some(ref exe) = current_exe {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("gwyd");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    PathBuf::from("gwyd")
}

/// Spawn `gwyd` detached, with stdio discarded. The caller is responsible
/// for waiting until it either becomes ready or exits.
pub fn spawn_background() -> Result<std::process::Child> {
    let gwyd = find_gwyd_binary();
    Command::new(&gwyd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("failed to spawn {}: {e}", gwyd.display()))
}

/// Read the pid file written by `gwy_daemon::lifecycle::startup`.
pub fn read_pid(pid_path: &Path) -> Option<u32> {
    std::fs::read_to_string(pid_path).ok()?.trim().parse().ok()
}

/// Whether a process with this pid is alive, via `kill -0`.
pub fn process_exists(pid: u32) -> bool {
    signal(pid, "-0")
}

/// Send SIGTERM.
pub fn terminate(pid: u32) -> bool {
    signal(pid, "-15")
}

/// Send SIGKILL.
pub fn force_kill(pid: u32) -> bool {
    signal(pid, "-9")
}

fn signal(pid: u32, flag: &str) -> bool {
    Command::new("kill")
        .args([flag, &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Poll `predicate` until it returns true or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    loop {
        if predicate() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(crate::env::poll_interval()).await;
    }
}

/// Whether the gateway is accepting TCP connections at `addr`.
pub async fn probe_listening(addr: std::net::SocketAddr) -> bool {
    tokio::time::timeout(Duration::from_millis(300), tokio::net::TcpStream::connect(addr)).await.map(|r| r.is_ok()).unwrap_or(false)
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
