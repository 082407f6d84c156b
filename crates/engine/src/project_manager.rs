// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project lifecycle (§3, §4.3): creation with nesting/path validation,
//! deletion, session continuity, and the in-memory handle each project
//! carries for its exec lock, its log, and its subscriber set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gwy_core::{Clock, ClientId, ErrorKind, GatewayError, IdGen, ProjectId, ProjectState};
use gwy_storage::{MessageLog, MessageLogConfig, ProjectRecord, ProjectStore};
use parking_lot::{Mutex as SyncMutex, RwLock};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::error::EngineError;

/// An outbound envelope sender for one subscribed client, plus a side
/// channel the router uses to force-close a slow consumer (§5 backpressure
/// policy) without blocking the broadcaster on the main queue.
#[derive(Clone)]
pub struct Subscriber {
    pub tx: mpsc::Sender<gwy_core::Envelope>,
    pub close_tx: mpsc::Sender<ErrorKind>,
}

/// Mutable, frequently-updated fields of a project, guarded by a single
/// short-held lock (§5 "per-project state lock").
struct Fields {
    session_id: Option<String>,
    state: ProjectState,
    created_at: String,
    last_active_at: String,
}

/// The full in-memory representation of one project. Owned exclusively by
/// [`ProjectManager`]; the [`crate::Executor`] borrows `exec_lock` for the
/// duration of one run, and the [`crate::Router`] only reads `subscribers`.
pub struct ProjectHandle {
    pub id: ProjectId,
    pub path: PathBuf,
    fields: SyncMutex<Fields>,
    /// Held for the full duration of one execution (§4.4, §9). A
    /// [`tokio::sync::Mutex::try_lock_owned`] gives the fail-fast
    /// `process_active` behavior the executor needs.
    pub exec_lock: Arc<AsyncMutex<()>>,
    pub log: SyncMutex<MessageLog>,
    pub subscribers: RwLock<HashMap<ClientId, Subscriber>>,
}

impl ProjectHandle {
    pub fn state(&self) -> ProjectState {
        self.fields.lock().state
    }

    pub fn session_id(&self) -> Option<String> {
        self.fields.lock().session_id.clone()
    }

    pub fn set_state(&self, state: ProjectState) {
        self.fields.lock().state = state;
    }
}

/// A read-only snapshot of a project's durable fields, returned from the
/// manager's CRUD operations.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    pub id: ProjectId,
    pub path: PathBuf,
    pub session_id: Option<String>,
    pub state: ProjectState,
    pub created_at: String,
    pub last_active_at: String,
}

/// Project CRUD, nesting enforcement, and the in-memory project map
/// (§4.3). Generic over the clock and id generator so tests run
/// deterministically.
pub struct ProjectManager<C: Clock, G: IdGen> {
    store: ProjectStore,
    clock: C,
    idgen: G,
    max_projects: usize,
    log_config: MessageLogConfig,
    projects: RwLock<indexmap::IndexMap<ProjectId, Arc<ProjectHandle>>>,
}

impl<C: Clock, G: IdGen> ProjectManager<C, G> {
    pub fn new(store: ProjectStore, clock: C, idgen: G, max_projects: usize, log_config: MessageLogConfig) -> Self {
        Self {
            store,
            clock,
            idgen,
            max_projects,
            log_config,
            projects: RwLock::new(indexmap::IndexMap::new()),
        }
    }

    /// Load every project with valid on-disk metadata (§8: "after restart,
    /// `List()` returns exactly the set of projects with valid on-disk
    /// metadata"). Corrupt entries are already quarantined by the store.
    pub fn load_from_disk(&self) -> Result<usize, EngineError> {
        let records = self.store.scan_all()?;
        let mut projects = self.projects.write();
        for record in records {
            let handle = self.handle_from_record(record)?;
            projects.insert(handle.id.clone(), Arc::new(handle));
        }
        Ok(projects.len())
    }

    fn handle_from_record(&self, record: ProjectRecord) -> Result<ProjectHandle, EngineError> {
        let logs_dir = self.store.project_dir(&record.id).join("logs");
        let log = MessageLog::open(logs_dir, self.log_config)?;
        Ok(ProjectHandle {
            id: record.id,
            path: record.path,
            fields: SyncMutex::new(Fields {
                session_id: record.session_id,
                state: ProjectState::Idle,
                created_at: record.created_at,
                last_active_at: record.last_active_at,
            }),
            exec_lock: Arc::new(AsyncMutex::new(())),
            log: SyncMutex::new(log),
            subscribers: RwLock::new(HashMap::new()),
        })
    }

    /// Create a new project anchored at `path` (§4.3 `Create`).
    pub fn create(&self, path: &str) -> Result<ProjectView, EngineError> {
        let raw = Path::new(path);
        if !raw.is_absolute() {
            return Err(invalid_path(path, "path must be absolute"));
        }

        let canonical = std::fs::canonicalize(raw).map_err(|_| invalid_path(path, "path does not exist"))?;
        if !canonical.is_dir() {
            return Err(invalid_path(path, "path is not a directory"));
        }

        let mut projects = self.projects.write();
        if projects.len() >= self.max_projects {
            return Err(GatewayError::new(ErrorKind::ResourceLimit, "maximum project count reached").into());
        }
        if let Some(existing) = nested_conflict(projects.values(), &canonical) {
            return Err(GatewayError::new(
                ErrorKind::ProjectNesting,
                format!("project path conflicts with existing project {existing}"),
            )
            .with_details(serde_json::json!({ "path": canonical.display().to_string() }))
            .into());
        }

        let id = ProjectId::new(self.idgen.next());
        let now = gwy_core::now_rfc3339();
        let record = ProjectRecord {
            id: id.clone(),
            path: canonical.clone(),
            session_id: None,
            created_at: now.clone(),
            last_active_at: now.clone(),
        };
        self.store.save(&record)?;

        let handle = self.handle_from_record(record)?;
        let view = view_of(&handle);
        projects.insert(id, Arc::new(handle));
        Ok(view)
    }

    /// Delete a project (§4.3 `Delete`). Returns the removed handle so the
    /// caller can notify its subscribers before it is dropped.
    pub fn delete(&self, id: &ProjectId) -> Result<Arc<ProjectHandle>, EngineError> {
        let mut projects = self.projects.write();
        let handle = projects
            .get(id)
            .cloned()
            .ok_or_else(|| project_not_found(id))?;
        if handle.state() == ProjectState::Executing {
            return Err(GatewayError::new(ErrorKind::ProcessActive, "project has an active execution").into());
        }
        projects.shift_remove(id);
        drop(projects);
        self.store.trash(id)?;
        Ok(handle)
    }

    pub fn get(&self, id: &ProjectId) -> Option<Arc<ProjectHandle>> {
        self.projects.read().get(id).cloned()
    }

    pub fn get_or_not_found(&self, id: &ProjectId) -> Result<Arc<ProjectHandle>, EngineError> {
        self.get(id).ok_or_else(|| project_not_found(id))
    }

    pub fn list(&self) -> Vec<ProjectView> {
        self.projects.read().values().map(|h| view_of(h)).collect()
    }

    /// Persist a new session id produced by a completed run (§4.3
    /// `UpdateSession`, called by the executor, never by a client).
    pub fn update_session(&self, id: &ProjectId, session_id: Option<String>) -> Result<(), EngineError> {
        let handle = self.get_or_not_found(id)?;
        {
            let mut fields = handle.fields.lock();
            fields.session_id = session_id;
            fields.last_active_at = self.now();
        }
        self.persist(&handle)
    }

    /// Clear a project's session id (§4.3 `ClearSession`). Refuses while
    /// executing; otherwise also resets an `ERROR` state to `IDLE` (§4.7
    /// state machine: "Any → IDLE on accepted `agent_new_session`").
    pub fn clear_session(&self, id: &ProjectId) -> Result<(), EngineError> {
        let handle = self.get_or_not_found(id)?;
        {
            let mut fields = handle.fields.lock();
            if fields.state == ProjectState::Executing {
                return Err(GatewayError::new(ErrorKind::ProcessActive, "project has an active execution").into());
            }
            fields.session_id = None;
            fields.state = ProjectState::Idle;
            fields.last_active_at = self.now();
        }
        self.persist(&handle)
    }

    fn persist(&self, handle: &ProjectHandle) -> Result<(), EngineError> {
        let fields = handle.fields.lock();
        let record = ProjectRecord {
            id: handle.id.clone(),
            path: handle.path.clone(),
            session_id: fields.session_id.clone(),
            created_at: fields.created_at.clone(),
            last_active_at: fields.last_active_at.clone(),
        };
        drop(fields);
        self.store.save(&record)?;
        Ok(())
    }

    fn now(&self) -> String {
        let millis = self.clock.now_millis();
        chrono::DateTime::from_timestamp_millis(millis)
            .unwrap_or_else(chrono::Utc::now)
            .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
    }
}

fn view_of(handle: &ProjectHandle) -> ProjectView {
    let fields = handle.fields.lock();
    ProjectView {
        id: handle.id.clone(),
        path: handle.path.clone(),
        session_id: fields.session_id.clone(),
        state: fields.state,
        created_at: fields.created_at.clone(),
        last_active_at: fields.last_active_at.clone(),
    }
}

pub fn project_not_found(id: &ProjectId) -> EngineError {
    GatewayError::new(ErrorKind::ProjectNotFound, format!("unknown project {id}")).into()
}

fn invalid_path(path: &str, why: &str) -> EngineError {
    GatewayError::new(ErrorKind::InvalidPath, why).with_details(serde_json::json!({ "path": path })).into()
}

/// `true` if `candidate` equals, contains, or is contained by any existing
/// project's path at a directory boundary (§3 nesting invariant).
fn nested_conflict<'a>(
    existing: impl Iterator<Item = &'a Arc<ProjectHandle>>,
    candidate: &Path,
) -> Option<ProjectId> {
    existing
        .find(|handle| paths_conflict(&handle.path, candidate))
        .map(|handle| handle.id.clone())
}

fn paths_conflict(a: &Path, b: &Path) -> bool {
    a == b || a.starts_with(b) || b.starts_with(a)
}

#[cfg(test)]
impl ProjectHandle {
    /// Construct a bare handle for router/executor unit tests that don't
    /// need the full manager (no persistence, fixed timestamps).
    pub(crate) fn new_for_test(id: ProjectId, path: PathBuf, log: MessageLog) -> Self {
        Self {
            id,
            path,
            fields: SyncMutex::new(Fields {
                session_id: None,
                state: ProjectState::Idle,
                created_at: "2026-01-01T00:00:00.000000000Z".to_string(),
                last_active_at: "2026-01-01T00:00:00.000000000Z".to_string(),
            }),
            exec_lock: Arc::new(AsyncMutex::new(())),
            log: SyncMutex::new(log),
            subscribers: RwLock::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
#[path = "project_manager_tests.rs"]
mod tests;
