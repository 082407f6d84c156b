// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `execute` options (§4.4, §6) — each field maps to a well-defined agent
//! CLI flag. Unknown values are rejected before spawn.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, GatewayError};

/// `--permission-mode` values accepted by the agent CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
}

impl PermissionMode {
    pub fn as_flag(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::Plan => "plan",
        }
    }
}

/// Optional fields accompanying an `execute` request.
///
/// Every field here has a direct, single-purpose CLI flag on the agent
/// binary; there is no free-form passthrough. `deny_unknown_fields` makes
/// an unrecognized option key a deserialize error rather than a silent
/// no-op (§6: "unrecognized options fail with `invalid_parameter`").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<PermissionMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disallowed_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_dirs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_config_path: Option<String>,
    #[serde(default)]
    pub strict_mcp: bool,
}

impl ExecuteOptions {
    /// Build the CLI argument vector for these options, in a fixed order.
    /// `session_id`, when present, appends the continuation flag.
    pub fn to_args(&self, session_id: Option<&str>) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(mode) = self.permission_mode {
            args.push("--permission-mode".to_string());
            args.push(mode.as_flag().to_string());
        }
        if !self.allowed_tools.is_empty() {
            args.push("--allowed-tools".to_string());
            args.push(self.allowed_tools.join(","));
        }
        if !self.disallowed_tools.is_empty() {
            args.push("--disallowed-tools".to_string());
            args.push(self.disallowed_tools.join(","));
        }
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        for dir in &self.add_dirs {
            args.push("--add-dir".to_string());
            args.push(dir.clone());
        }
        if let Some(prompt) = &self.system_prompt {
            args.push("--append-system-prompt".to_string());
            args.push(prompt.clone());
        }
        if let Some(path) = &self.mcp_config_path {
            args.push("--mcp-config".to_string());
            args.push(path.clone());
        }
        if self.strict_mcp {
            args.push("--strict-mcp-config".to_string());
        }
        if let Some(session_id) = session_id {
            args.push("-c".to_string());
            args.push(session_id.to_string());
        }

        args
    }

    /// Validate field shapes that serde's type system can't already
    /// enforce (non-empty tool names, a plausible model id, etc.).
    pub fn validate(&self) -> Result<(), GatewayError> {
        let empty_name = self
            .allowed_tools
            .iter()
            .chain(self.disallowed_tools.iter())
            .any(|name| name.trim().is_empty());
        if empty_name {
            return Err(GatewayError::new(
                ErrorKind::InvalidParameter,
                "tool names must not be empty",
            ));
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(GatewayError::new(ErrorKind::InvalidParameter, "model must not be empty"));
            }
        }
        if let Some(path) = &self.mcp_config_path {
            if path.trim().is_empty() {
                return Err(GatewayError::new(
                    ErrorKind::InvalidParameter,
                    "mcp_config_path must not be empty",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
