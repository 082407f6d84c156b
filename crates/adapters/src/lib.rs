// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gwy-adapters: the agent CLI process boundary — spawning, a size-bounded
//! line reader for its stdout stream, environment scrubbing, and
//! SIGTERM/SIGKILL process control.

mod agent_cli;
mod env;
mod error;
mod line_reader;
mod process;

pub use agent_cli::{AgentCli, AgentExit, AgentInvocation, AgentLine, AgentRun, ProcessAgentCli};
pub use env::{execution_timeout, max_line_bytes, scrubbed_environment, termination_grace};
pub use error::AgentError;
pub use line_reader::{read_line_bounded, LineOutcome};
pub use process::{is_alive, kill, terminate, terminate_with_grace};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAgentCli, FakeRun};
