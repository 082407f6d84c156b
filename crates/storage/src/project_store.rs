// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project metadata persistence (§4.2).
//!
//! Writes use write-temp-then-rename: serialize to `metadata.json.tmp` in
//! the project's own directory, fsync it, then rename over `metadata.json`.
//! The file is never written in place. On startup every project directory
//! is scanned; a directory whose metadata fails to parse is quarantined
//! rather than deleted.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use gwy_core::ProjectId;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StorageError;

/// Durable fields of a project (§3). Transient fields — subscribers,
/// `exec_lock`, the log handle — live only in the engine's in-memory map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub created_at: String,
    pub last_active_at: String,
}

/// Persists project metadata under `<data>/projects/<id>/metadata.json` and
/// enumerates all projects on boot.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    data_dir: PathBuf,
}

impl ProjectStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn project_dir(&self, id: &ProjectId) -> PathBuf {
        self.data_dir.join("projects").join(id.as_str())
    }

    fn metadata_path(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join("metadata.json")
    }

    fn corrupt_dir(&self, id_or_name: &str) -> PathBuf {
        self.data_dir.join("corrupt").join(id_or_name)
    }

    /// Persist a project record atomically (write-temp-then-rename).
    pub fn save(&self, record: &ProjectRecord) -> Result<(), StorageError> {
        let dir = self.project_dir(&record.id);
        std::fs::create_dir_all(&dir)?;

        let final_path = self.metadata_path(&record.id);
        let tmp_path = dir.join("metadata.json.tmp");

        let json = serde_json::to_vec_pretty(record)?;
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &final_path)?;
        if let Ok(dir_handle) = File::open(&dir) {
            let _ = dir_handle.sync_all();
        }
        Ok(())
    }

    /// Load a single project's metadata.
    pub fn load(&self, id: &ProjectId) -> Result<ProjectRecord, StorageError> {
        let bytes = std::fs::read(self.metadata_path(id))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Enumerate every project directory under `<data>/projects/`.
    ///
    /// Directories whose `metadata.json` is missing or fails to parse are
    /// moved to `<data>/corrupt/<id>/` and logged; they are never deleted
    /// and never returned.
    pub fn scan_all(&self) -> Result<Vec<ProjectRecord>, StorageError> {
        let projects_dir = self.data_dir.join("projects");
        std::fs::create_dir_all(&projects_dir)?;

        let mut records = Vec::new();
        for entry in std::fs::read_dir(&projects_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match std::fs::read(entry.path().join("metadata.json")) {
                Ok(bytes) => match serde_json::from_slice::<ProjectRecord>(&bytes) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        warn!(project = %name, error = %e, "quarantining project with unparseable metadata");
                        self.quarantine(&entry.path(), &name)?;
                    }
                },
                Err(e) => {
                    warn!(project = %name, error = %e, "quarantining project with missing metadata");
                    self.quarantine(&entry.path(), &name)?;
                }
            }
        }
        Ok(records)
    }

    fn quarantine(&self, project_path: &Path, name: &str) -> Result<(), StorageError> {
        let dest = self.corrupt_dir(name);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(project_path, dest)?;
        Ok(())
    }

    /// Rename a project's directory aside rather than deleting it outright
    /// (§4.3 `Delete`: "rename the project directory to a trash path").
    pub fn trash(&self, id: &ProjectId) -> Result<(), StorageError> {
        let dir = self.project_dir(id);
        if !dir.exists() {
            return Ok(());
        }
        let trash_dir = self.data_dir.join("trash");
        std::fs::create_dir_all(&trash_dir)?;
        let dest = trash_dir.join(format!("{}-{}", id.as_str(), gwy_core::now_rfc3339().replace([':', '.'], "-")));
        std::fs::rename(dir, dest)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "project_store_tests.rs"]
mod tests;
