// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy surfaced to clients (§7), and the common envelope
//! error used wherever a component boundary wraps an unexpected failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable machine-readable error codes carried in `error` envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPath,
    ProjectNesting,
    ProjectNotFound,
    ProcessActive,
    ProcessNotActive,
    ExecutionTimeout,
    AgentNotFound,
    InvalidParameter,
    ResourceLimit,
    SlowConsumer,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidPath => "invalid_path",
            ErrorKind::ProjectNesting => "project_nesting",
            ErrorKind::ProjectNotFound => "project_not_found",
            ErrorKind::ProcessActive => "process_active",
            ErrorKind::ProcessNotActive => "process_not_active",
            ErrorKind::ExecutionTimeout => "execution_timeout",
            ErrorKind::AgentNotFound => "agent_not_found",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::ResourceLimit => "resource_limit",
            ErrorKind::SlowConsumer => "slow_consumer",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed, user-visible gateway error: a stable `kind`, a human-readable
/// message, and optional structured `details` (e.g. the offending path).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
