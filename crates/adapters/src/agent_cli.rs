// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent CLI process adapter (§4.4, §9 "process invocation surface").
//!
//! The agent CLI is invoked as `<binary> -p <prompt> [-c <session_id>]
//! [flag-mapped options]` with the project directory as its working
//! directory. Stdout is a stream of newline-delimited JSON objects; stderr
//! is captured in full and surfaced only if the process exits non-zero.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use gwy_core::ExecuteOptions;
use serde_json::Value;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

use crate::env;
use crate::error::AgentError;
use crate::line_reader::{read_line_bounded, LineOutcome};
use crate::process;

/// One decoded unit of agent stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentLine {
    /// A parsed JSON event.
    Event(Value),
    /// A line that did not parse as JSON; carried verbatim (§4.4: "emitted
    /// as an `error` event and appended verbatim to the log").
    Malformed(String),
    /// A line that exceeded the configured max size before a newline.
    Oversize,
}

/// Terminal status of a finished agent subprocess.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentExit {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

/// Everything needed to launch one agent CLI invocation.
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    pub binary: PathBuf,
    pub prompt: String,
    pub options: ExecuteOptions,
    pub session_id: Option<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl AgentInvocation {
    fn args(&self) -> Vec<String> {
        let mut args = vec!["-p".to_string(), self.prompt.clone()];
        args.extend(self.options.to_args(self.session_id.as_deref()));
        args
    }
}

/// A running (or just-finished) agent process, generic over real vs. fake
/// implementations so the engine can be tested without a real subprocess.
#[async_trait]
pub trait AgentRun: Send {
    fn pid(&self) -> Option<u32>;

    /// Read the next stdout line. `Ok(None)` signals EOF — the caller
    /// should then call `wait`.
    async fn next_line(&mut self) -> Result<Option<AgentLine>, AgentError>;

    /// Reap the process and collect its exit status and captured stderr.
    async fn wait(self: Box<Self>) -> Result<AgentExit, AgentError>;

    /// SIGTERM, then SIGKILL after `grace` if still alive (§4.4).
    async fn terminate_with_grace(&self, grace: Duration);
}

/// Spawns agent CLI subprocesses.
#[async_trait]
pub trait AgentCli: Send + Sync + 'static {
    async fn spawn(&self, invocation: AgentInvocation) -> Result<Box<dyn AgentRun>, AgentError>;
}

/// The real adapter: spawns the configured binary as a child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessAgentCli;

#[async_trait]
impl AgentCli for ProcessAgentCli {
    async fn spawn(&self, invocation: AgentInvocation) -> Result<Box<dyn AgentRun>, AgentError> {
        let mut cmd = Command::new(&invocation.binary);
        cmd.args(invocation.args())
            .current_dir(&invocation.cwd)
            .env_clear()
            .envs(invocation.env.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AgentError::NotFound(invocation.binary.display().to_string())
            } else {
                AgentError::SpawnFailed(e)
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::SpawnFailed(std::io::Error::other("child stdout was not piped")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::SpawnFailed(std::io::Error::other("child stderr was not piped")))?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        Ok(Box::new(ProcessAgentRun {
            child,
            stdout: BufReader::new(stdout),
            stderr_task,
            max_line: env::max_line_bytes(),
        }))
    }
}

struct ProcessAgentRun {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: tokio::task::JoinHandle<String>,
    max_line: usize,
}

#[async_trait]
impl AgentRun for ProcessAgentRun {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn next_line(&mut self) -> Result<Option<AgentLine>, AgentError> {
        match read_line_bounded(&mut self.stdout, self.max_line)
            .await
            .map_err(AgentError::Io)?
        {
            None => Ok(None),
            Some(LineOutcome::Oversize) => Ok(Some(AgentLine::Oversize)),
            Some(LineOutcome::Line(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => Ok(Some(AgentLine::Event(value))),
                Err(_) => Ok(Some(AgentLine::Malformed(text))),
            },
        }
    }

    async fn wait(mut self: Box<Self>) -> Result<AgentExit, AgentError> {
        let status = self.child.wait().await.map_err(AgentError::Io)?;
        let stderr = self.stderr_task.await.unwrap_or_default();
        Ok(AgentExit {
            success: status.success(),
            code: status.code(),
            stderr,
        })
    }

    async fn terminate_with_grace(&self, grace: Duration) {
        if let Some(pid) = self.pid() {
            process::terminate_with_grace(pid, grace).await;
        }
    }
}

#[cfg(test)]
#[path = "agent_cli_tests.rs"]
mod tests;
