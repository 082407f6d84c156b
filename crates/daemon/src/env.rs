// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve data directory: GWY_DATA_DIR > XDG_STATE_HOME/gwy > ~/.local/state/gwy
pub fn data_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("GWY_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("gwy"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/gwy"))
}

/// Address the WebSocket listener binds to. Default `127.0.0.1:8787`.
pub fn bind_addr() -> Result<SocketAddr, LifecycleError> {
    match std::env::var("GWY_BIND_ADDR") {
        Ok(addr) => addr.parse().map_err(|_| LifecycleError::InvalidBindAddr(addr)),
        Err(_) => Ok(SocketAddr::from(([127, 0, 0, 1], 8787))),
    }
}

/// Maximum number of live projects. Default 100.
pub fn max_projects() -> usize {
    parse_usize("GWY_MAX_PROJECTS").unwrap_or(100)
}

/// Per-subscriber bounded outbound queue capacity. Default matches
/// [`gwy_engine::DEFAULT_QUEUE_CAPACITY`].
pub fn subscriber_queue_capacity() -> usize {
    parse_usize("GWY_QUEUE_CAPACITY").unwrap_or(gwy_engine::DEFAULT_QUEUE_CAPACITY)
}

/// Inbound frame size cap, in bytes. Default 1 MiB (§4.6).
pub fn max_inbound_bytes() -> usize {
    parse_usize("GWY_MAX_INBOUND_BYTES").unwrap_or(1024 * 1024)
}

/// Idle timeout before a connection with no frame activity is closed (§4.6).
pub fn idle_timeout() -> Duration {
    parse_duration_ms("GWY_IDLE_TIMEOUT_MS").unwrap_or(Duration::from_secs(60))
}

/// Interval between server-initiated heartbeat `ping` frames.
pub fn heartbeat_interval() -> Duration {
    parse_duration_ms("GWY_HEARTBEAT_MS").unwrap_or(Duration::from_secs(20))
}

/// Per-frame write timeout (§5).
pub fn write_timeout() -> Duration {
    parse_duration_ms("GWY_WRITE_TIMEOUT_MS").unwrap_or(Duration::from_secs(10))
}

/// Agent CLI binary invoked for every execution. Default `claude`, looked
/// up on `PATH`.
pub fn agent_binary() -> PathBuf {
    std::env::var("GWY_AGENT_BINARY").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("claude"))
}

/// Global concurrency cap across all projects' executions (§4.4). Default 16.
pub fn max_concurrency() -> usize {
    parse_usize("GWY_MAX_CONCURRENCY").unwrap_or(16)
}

/// Per-connection inbound message rate cap, in messages per second (§5).
/// Default 50.
pub fn max_messages_per_sec() -> u32 {
    parse_usize("GWY_MAX_MSGS_PER_SEC").unwrap_or(50) as u32
}

/// Per-connection project join/leave rate cap, in operations per second (§5).
/// Default 20.
pub fn max_join_leave_per_sec() -> u32 {
    parse_usize("GWY_MAX_JOIN_LEAVE_PER_SEC").unwrap_or(20) as u32
}

fn parse_usize(var: &str) -> Option<usize> {
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
