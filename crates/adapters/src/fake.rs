// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A scripted `AgentCli` for engine tests: no subprocess, just a queue of
//! canned runs handed out in call order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::agent_cli::{AgentCli, AgentExit, AgentInvocation, AgentLine, AgentRun};
use crate::error::AgentError;

/// One scripted subprocess lifecycle: a sequence of stdout lines followed
/// by an exit status.
#[derive(Debug, Clone)]
pub struct FakeRun {
    pub lines: Vec<AgentLine>,
    pub exit: AgentExit,
}

impl FakeRun {
    pub fn success(lines: Vec<AgentLine>) -> Self {
        Self {
            lines,
            exit: AgentExit {
                success: true,
                code: Some(0),
                stderr: String::new(),
            },
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            lines: Vec::new(),
            exit: AgentExit {
                success: false,
                code: Some(code),
                stderr: stderr.into(),
            },
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeAgentCli {
    calls: Arc<Mutex<Vec<AgentInvocation>>>,
    script: Arc<Mutex<VecDeque<FakeRun>>>,
}

impl FakeAgentCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a run to be handed out on the next `spawn` call.
    pub async fn push_run(&self, run: FakeRun) {
        self.script.lock().await.push_back(run);
    }

    /// All invocations received so far, in order.
    pub async fn calls(&self) -> Vec<AgentInvocation> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl AgentCli for FakeAgentCli {
    async fn spawn(&self, invocation: AgentInvocation) -> Result<Box<dyn AgentRun>, AgentError> {
        self.calls.lock().await.push(invocation);
        let run = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| FakeRun::success(Vec::new()));
        Ok(Box::new(FakeAgentProcess {
            lines: run.lines.into(),
            exit: run.exit,
        }))
    }
}

struct FakeAgentProcess {
    lines: VecDeque<AgentLine>,
    exit: AgentExit,
}

#[async_trait]
impl AgentRun for FakeAgentProcess {
    fn pid(&self) -> Option<u32> {
        None
    }

    async fn next_line(&mut self) -> Result<Option<AgentLine>, AgentError> {
        Ok(self.lines.pop_front())
    }

    async fn wait(self: Box<Self>) -> Result<AgentExit, AgentError> {
        Ok(self.exit)
    }

    async fn terminate_with_grace(&self, _grace: Duration) {}
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
