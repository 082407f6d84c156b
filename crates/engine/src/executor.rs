// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess invocation, per-project serialization, and JSON stream
//! parsing (§4.4).
//!
//! At most one execution runs per project at a time; the project's
//! `exec_lock` is the enforcement point (§9: "naturally expressed with a
//! mutual-exclusion primitive owned by the project"). A global semaphore
//! caps total concurrent executions across all projects. The active-run
//! table is the ground truth for "is executing" and the target of `Kill`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gwy_adapters::{AgentCli, AgentError, AgentExit, AgentInvocation, AgentLine};
use gwy_core::{Clock, Direction, ErrorKind, Envelope, ExecuteOptions, GatewayError, IdGen, ProjectId, ProjectState};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::project_manager::{project_not_found, ProjectHandle, ProjectManager};
use crate::router::Router;

/// Tunables for subprocess invocation (§4.4, §5).
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub agent_binary: PathBuf,
    pub execution_timeout: Duration,
    pub termination_grace: Duration,
    pub max_concurrency: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            agent_binary: PathBuf::from("claude"),
            execution_timeout: Duration::from_secs(5 * 60),
            termination_grace: Duration::from_secs(5),
            max_concurrency: 16,
        }
    }
}

struct ActiveRun {
    started_at: std::time::Instant,
    cancel: CancellationToken,
}

/// Why a run's output loop stopped, distinct from the subprocess's own
/// exit status — the same nonzero exit can be self-inflicted (timeout,
/// explicit kill) or a genuine crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Eof,
    Timeout,
    Killed,
    Oversize,
}

pub struct Executor<C: Clock, G: IdGen, A: AgentCli> {
    agent_cli: Arc<A>,
    config: ExecutorConfig,
    router: Router,
    manager: Arc<ProjectManager<C, G>>,
    active: Mutex<HashMap<ProjectId, ActiveRun>>,
    concurrency: Arc<tokio::sync::Semaphore>,
}

impl<C: Clock, G: IdGen, A: AgentCli> Executor<C, G, A> {
    pub fn new(manager: Arc<ProjectManager<C, G>>, agent_cli: Arc<A>, config: ExecutorConfig) -> Arc<Self> {
        let max_concurrency = config.max_concurrency;
        Arc::new(Self {
            agent_cli,
            config,
            router: Router::new(),
            manager,
            active: Mutex::new(HashMap::new()),
            concurrency: Arc::new(tokio::sync::Semaphore::new(max_concurrency)),
        })
    }

    pub fn is_active(&self, id: &ProjectId) -> bool {
        self.active.lock().contains_key(id)
    }

    /// Wall-clock duration since the current run for `project_id` started,
    /// if one is active. Used by the admin CLI's status query.
    pub fn active_since(&self, id: &ProjectId) -> Option<Duration> {
        self.active.lock().get(id).map(|run| run.started_at.elapsed())
    }

    /// Start a run for `project`. Validates options, enforces the
    /// at-most-one-execution rule, and returns as soon as the run has been
    /// accepted and its `EXECUTING` state broadcast — the run itself
    /// streams and completes in a spawned task.
    pub async fn execute(
        self: &Arc<Self>,
        project: Arc<ProjectHandle>,
        prompt: String,
        options: ExecuteOptions,
    ) -> Result<(), EngineError> {
        options.validate()?;

        let guard = Arc::clone(&project.exec_lock).try_lock_owned().map_err(|_| {
            EngineError::from(GatewayError::new(ErrorKind::ProcessActive, "project already has an active execution"))
        })?;

        let cancel = CancellationToken::new();
        self.active.lock().insert(
            project.id.clone(),
            ActiveRun {
                started_at: std::time::Instant::now(),
                cancel: cancel.clone(),
            },
        );
        project.set_state(ProjectState::Executing);
        self.router.broadcast(&project, &state_envelope(&project, ProjectState::Executing, None));

        let executor = Arc::clone(self);
        tokio::spawn(async move {
            let permit = executor.concurrency.clone().acquire_owned().await.ok();
            executor.run(project, prompt, options, guard, cancel).await;
            drop(permit);
        });
        Ok(())
    }

    /// Terminate the active run for `project_id`, if any (§4.4 `Kill`).
    /// Idempotent after the first successful call.
    pub fn kill(&self, project_id: &ProjectId) -> Result<(), EngineError> {
        let active = self.active.lock();
        match active.get(project_id) {
            Some(run) => {
                run.cancel.cancel();
                Ok(())
            }
            None => Err(GatewayError::new(ErrorKind::ProcessNotActive, "no active execution for project").into()),
        }
    }

    async fn run(
        self: Arc<Self>,
        project: Arc<ProjectHandle>,
        prompt: String,
        options: ExecuteOptions,
        _guard: tokio::sync::OwnedMutexGuard<()>,
        cancel: CancellationToken,
    ) {
        let invocation = AgentInvocation {
            binary: self.config.agent_binary.clone(),
            prompt,
            options,
            session_id: project.session_id(),
            cwd: project.path.clone(),
            env: gwy_adapters::scrubbed_environment(),
        };

        let outcome = match self.agent_cli.spawn(invocation).await {
            Ok(run) => self.stream(&project, run, cancel).await,
            Err(e) => RunOutcome::SpawnFailed(e),
        };

        self.finish(&project, outcome).await;
        self.active.lock().remove(&project.id);
    }

    async fn stream(&self, project: &ProjectHandle, mut run: Box<dyn gwy_adapters::AgentRun>, cancel: CancellationToken) -> RunOutcome {
        let deadline = Instant::now() + self.config.execution_timeout;
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        let mut latest_session_id = None;
        let mut stop = StopReason::Eof;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stop = StopReason::Killed;
                    break;
                }
                () = &mut sleep => {
                    stop = StopReason::Timeout;
                    break;
                }
                line = run.next_line() => {
                    match line {
                        Ok(Some(AgentLine::Event(value))) => {
                            if let Some(sid) = extract_session_id(&value) {
                                latest_session_id = Some(sid);
                            }
                            self.log_and_broadcast(project, Direction::Agent, value.clone());
                            self.router.broadcast(project, &Envelope::response("agent_message", Some(project.id.clone()), Some(value)));
                        }
                        Ok(Some(AgentLine::Malformed(text))) => {
                            warn!(project = %project.id, "agent emitted non-JSON output line");
                            let payload = json!({ "raw": text });
                            self.log_and_broadcast(project, Direction::Agent, payload.clone());
                            self.router.broadcast(project, &error_envelope(&project.id, ErrorKind::InternalError, "malformed agent output", Some(payload)));
                        }
                        Ok(Some(AgentLine::Oversize)) => {
                            stop = StopReason::Oversize;
                            break;
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(project = %project.id, error = %e, "error reading agent stdout");
                            break;
                        }
                    }
                }
            }
        }

        if stop != StopReason::Eof {
            run.terminate_with_grace(self.config.termination_grace).await;
        }

        let exit = run.wait().await;
        RunOutcome::Ran { stop, exit, session_id: latest_session_id }
    }

    fn log_and_broadcast(&self, project: &ProjectHandle, direction: Direction, message: Value) {
        if let Err(e) = project.log.lock().append(direction, message) {
            warn!(project = %project.id, error = %e, "failed to append to message log");
        }
    }

    async fn finish(&self, project: &ProjectHandle, outcome: RunOutcome) {
        match outcome {
            RunOutcome::Ran { stop: StopReason::Eof, exit, session_id } if exit.success => {
                if let Err(e) = self.manager.update_session(&project.id, session_id.clone()) {
                    warn!(project = %project.id, error = %e, "failed to persist session id");
                }
                project.set_state(ProjectState::Idle);
                self.router.broadcast(project, &state_envelope(project, ProjectState::Idle, session_id));
            }
            RunOutcome::Ran { stop, exit, .. } => {
                project.set_state(ProjectState::Error);
                self.emit_terminal_error(project, stop, &exit);
                self.router.broadcast(project, &state_envelope(project, ProjectState::Error, None));
            }
            RunOutcome::SpawnFailed(e) => {
                project.set_state(ProjectState::Error);
                let kind = match e {
                    AgentError::NotFound(_) => ErrorKind::AgentNotFound,
                    _ => ErrorKind::InternalError,
                };
                self.router.broadcast(project, &error_envelope(&project.id, kind, &e.to_string(), None));
                self.router.broadcast(project, &state_envelope(project, ProjectState::Error, None));
            }
        }
    }

    fn emit_terminal_error(&self, project: &ProjectHandle, stop: StopReason, exit: &AgentExit) {
        let envelope = match stop {
            StopReason::Timeout => error_envelope(&project.id, ErrorKind::ExecutionTimeout, "execution exceeded the configured deadline", None),
            StopReason::Killed => Envelope::response("agent_killed", Some(project.id.clone()), None),
            StopReason::Oversize => error_envelope(
                &project.id,
                ErrorKind::InvalidParameter,
                "agent output line exceeded the maximum size",
                None,
            ),
            StopReason::Eof => error_envelope(
                &project.id,
                ErrorKind::InternalError,
                "agent process exited with an error",
                Some(json!({ "code": exit.code, "stderr": exit.stderr })),
            ),
        };
        self.log_and_broadcast(project, Direction::Agent, serde_json::to_value(&envelope).unwrap_or(Value::Null));
        self.router.broadcast(project, &envelope);
    }
}

enum RunOutcome {
    Ran { stop: StopReason, exit: AgentExit, session_id: Option<String> },
    SpawnFailed(AgentError),
}

fn extract_session_id(value: &Value) -> Option<String> {
    value.get("session_id").and_then(Value::as_str).map(str::to_string)
}

fn state_envelope(project: &ProjectHandle, state: ProjectState, session_id: Option<String>) -> Envelope {
    let mut data = json!({ "state": state });
    if let Some(session_id) = session_id.or_else(|| project.session_id()) {
        data["session_id"] = Value::String(session_id);
    }
    Envelope::response("project_state", Some(project.id.clone()), Some(data))
}

fn error_envelope(project_id: &ProjectId, kind: ErrorKind, message: &str, details: Option<Value>) -> Envelope {
    let mut data = json!({ "code": kind.as_str(), "message": message });
    if let Some(details) = details {
        data["details"] = details;
    }
    Envelope::response("error", Some(project_id.clone()), Some(data))
}

/// Used by the dispatcher to report `process_not_active` without poking
/// at the executor's private table directly.
pub fn unknown_project(id: &ProjectId) -> EngineError {
    project_not_found(id)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
