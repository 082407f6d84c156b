// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level error type: folds storage and agent-adapter failures into
//! the gateway's user-visible error taxonomy (§7).

use gwy_adapters::AgentError;
use gwy_core::{ErrorKind, GatewayError};
use gwy_storage::StorageError;
use thiserror::Error;

/// Internal error type used by the engine's components. Every external
/// caller (the dispatcher) converts this to a [`GatewayError`] at the
/// boundary — handlers never see raw storage or process errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("agent process error: {0}")]
    Agent(#[from] AgentError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Gateway(g) => g.kind,
            EngineError::Storage(_) | EngineError::Agent(_) => ErrorKind::InternalError,
        }
    }
}

impl From<EngineError> for GatewayError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Gateway(g) => g,
            EngineError::Storage(s) => GatewayError::new(ErrorKind::InternalError, s.to_string()),
            EngineError::Agent(a) => GatewayError::new(ErrorKind::InternalError, a.to_string()),
        }
    }
}
