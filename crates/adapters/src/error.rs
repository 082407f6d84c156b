// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors from agent process adapters.

use thiserror::Error;

/// Errors from spawning, streaming, or terminating an agent CLI process.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent binary not found: {0}")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(#[source] std::io::Error),
    #[error("i/o error reading agent output: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to signal process {pid}: {source}")]
    SignalFailed { pid: u32, source: std::io::Error },
}
