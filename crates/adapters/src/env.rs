// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

fn parse_bytes(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok())
}

/// Execution deadline before SIGTERM fires (§4.4, default: 5 minutes).
pub fn execution_timeout() -> Duration {
    parse_duration_ms("GWY_EXECUTION_TIMEOUT_MS").unwrap_or(Duration::from_secs(5 * 60))
}

/// Grace window between SIGTERM and SIGKILL (§4.4, default: 5s).
pub fn termination_grace() -> Duration {
    parse_duration_ms("GWY_KILL_GRACE_MS").unwrap_or(Duration::from_secs(5))
}

/// Max size of a single stdout line before it is rejected (§4.4, default: 1 MiB).
pub fn max_line_bytes() -> usize {
    parse_bytes("GWY_MAX_LINE_BYTES").unwrap_or(1024 * 1024) as usize
}

/// Name fragments (case-insensitive) that mark an environment variable as
/// credential-bearing. The agent subprocess never inherits these.
const SENSITIVE_NAME_FRAGMENTS: [&str; 5] = ["KEY", "TOKEN", "SECRET", "PASSWORD", "CREDENTIAL"];

/// The current process environment, minus anything that looks like a
/// credential by name. Used to build the agent subprocess's environment so
/// a misconfigured project can't leak the gateway's own secrets into an
/// agent transcript.
pub fn scrubbed_environment() -> Vec<(String, String)> {
    std::env::vars().filter(|(name, _)| !looks_sensitive(name)).collect()
}

fn looks_sensitive(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    SENSITIVE_NAME_FRAGMENTS.iter().any(|fragment| upper.contains(fragment))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
