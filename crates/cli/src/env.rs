// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the admin CLI crate.
//!
//! Data directory, bind address, and every other gateway tunable are
//! owned by `gwy_daemon::env` — this module only adds the CLI's own
//! polling/override knobs so the two binaries don't disagree about where
//! the gateway lives.

use std::path::PathBuf;
use std::time::Duration;

/// Override the `gwyd` binary location (defaults to PATH / sibling lookup).
pub fn daemon_binary() -> Option<String> {
    std::env::var("GWY_DAEMON_BINARY").ok()
}

pub fn cargo_manifest_dir() -> Option<String> {
    std::env::var("CARGO_MANIFEST_DIR").ok()
}

/// Poll interval while waiting for the daemon to become ready or exit.
pub fn poll_interval() -> Duration {
    parse_duration_ms("GWY_CLI_POLL_MS").unwrap_or(Duration::from_millis(50))
}

/// How long `start`/`stop` wait for the daemon to reach the desired state
/// before giving up.
pub fn wait_timeout() -> Duration {
    parse_duration_ms("GWY_CLI_TIMEOUT_MS").unwrap_or(Duration::from_secs(10))
}

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Default log file path, matching `gwy_daemon::lifecycle::Config::log_path`.
pub fn log_path() -> anyhow::Result<PathBuf> {
    Ok(gwy_daemon::env::data_dir()?.join("gateway.log"))
}
