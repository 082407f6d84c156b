// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project identity and lifecycle state.

use crate::define_id;
use serde::{Deserialize, Serialize};

define_id! {
    /// Opaque, stable identifier assigned to a project at creation.
    pub struct ProjectId;
}

/// Lifecycle state of a project, per §3 of the data model.
///
/// `state = Executing` holds exactly when the project has a single
/// registered execution in the executor's active-process table; it is
/// never set directly by handlers outside that invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectState {
    Idle,
    Executing,
    Error,
}

impl ProjectState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectState::Idle => "IDLE",
            ProjectState::Executing => "EXECUTING",
            ProjectState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for ProjectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
