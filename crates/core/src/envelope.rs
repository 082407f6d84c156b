// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wire envelope exchanged over the WebSocket connection (§6), and the
//! logged-message shape persisted by the message log (§3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::project::ProjectId;

/// Outer JSON object exchanged in both directions on the socket.
///
/// Client requests omit `timestamp`; the server sets it on every outbound
/// envelope. `data` carries the per-type payload as a loose JSON value —
/// handlers deserialize it into a concrete payload struct after the type
/// has been dispatched on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Envelope {
    /// Build a client-shaped envelope (no `timestamp`); used by tests and
    /// by any internal component that synthesizes a request.
    pub fn request(kind: impl Into<String>, project_id: Option<ProjectId>, data: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            project_id,
            data,
            timestamp: None,
        }
    }

    /// Build a server-shaped envelope, stamped with the current time.
    pub fn response(kind: impl Into<String>, project_id: Option<ProjectId>, data: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            project_id,
            data,
            timestamp: Some(now_rfc3339()),
        }
    }
}

/// Direction a logged message travelled: from the client to the gateway,
/// or an event produced by the agent subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Client,
    Agent,
}

/// One line in a project's JSONL message log (§3, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedMessage {
    pub timestamp: String,
    pub direction: Direction,
    pub message: Value,
}

/// Current wall-clock time formatted as RFC3339 with nanosecond precision,
/// in UTC (see Open Questions — UTC chosen for determinism).
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
