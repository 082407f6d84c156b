// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only, rotating per-project message log (§4.1).
//!
//! Segments live under `<data>/projects/<id>/logs/` as
//! `messages_<YYYY-MM-DD>_<HH-MM-SS>.jsonl`, named so a lexical sort is
//! also a chronological sort. A `current` sentinel file names the active
//! segment; it is rewritten write-temp-then-rename on every rotation so a
//! crash mid-rotation never leaves a dangling pointer.
//!
//! Rotation uses UTC exclusively for the date component (see Open
//! Questions in the design notes — local time would make rotation
//! boundaries depend on the host's timezone).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use gwy_core::{Direction, LoggedMessage};
use serde_json::Value;
use tracing::warn;

use crate::error::StorageError;

/// Default rotation and durability thresholds (§4.1).
#[derive(Debug, Clone, Copy)]
pub struct MessageLogConfig {
    pub max_bytes: u64,
    pub max_lines: u64,
    /// When true (the default), every append is followed by an fsync.
    pub fsync_every_append: bool,
}

impl Default for MessageLogConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
            max_lines: 10_000,
            fsync_every_append: true,
        }
    }
}

/// Handle to one project's append-only log. Not `Sync` across threads by
/// itself — callers serialize access with a per-log lock (§5), matching
/// the "per-log exclusive lock" discipline.
pub struct MessageLog {
    logs_dir: PathBuf,
    config: MessageLogConfig,
    current_path: PathBuf,
    file: File,
    bytes: u64,
    lines: u64,
    date: String,
    degraded: AtomicBool,
}

impl MessageLog {
    /// Open (or create) the log directory, rebuilding the segment pointer
    /// if it is missing (§4.1 failure semantics / crash recovery).
    pub fn open(logs_dir: PathBuf, config: MessageLogConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&logs_dir)?;

        let pointer_path = logs_dir.join("current");
        let pointed = std::fs::read_to_string(&pointer_path).ok().map(|s| s.trim().to_string());

        let segment_name = match pointed {
            Some(name) if !name.is_empty() && logs_dir.join(&name).exists() => name,
            _ => match Self::find_latest_segment(&logs_dir)? {
                Some(name) => {
                    warn!(logs_dir = %logs_dir.display(), segment = %name, "rebuilding missing segment pointer");
                    name
                }
                None => Self::new_segment_name(&Utc::now()),
            },
        };

        let current_path = logs_dir.join(&segment_name);
        let file = OpenOptions::new().create(true).append(true).open(&current_path)?;
        let bytes = file.metadata()?.len();
        let lines = count_lines(&current_path)?;
        Self::write_pointer(&logs_dir, &segment_name)?;
        let date = date_component(&segment_name);

        Ok(Self {
            logs_dir,
            config,
            current_path,
            file,
            bytes,
            lines,
            date,
            degraded: AtomicBool::new(false),
        })
    }

    /// Append one line to the current segment, rotating first if needed.
    /// On write failure the log is marked degraded and the error
    /// propagates; the caller's operation fails but the server keeps
    /// running (§7 propagation policy).
    pub fn append(&mut self, direction: Direction, message: Value) -> Result<(), StorageError> {
        let now = Utc::now();
        let today = now.format("%Y-%m-%d").to_string();
        if self.needs_rotation(&today) {
            self.rotate(now)?;
        }

        let entry = LoggedMessage {
            timestamp: now.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
            direction,
            message,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        match self.write_line(&line) {
            Ok(()) => {
                self.bytes += line.len() as u64;
                self.lines += 1;
                Ok(())
            }
            Err(e) => {
                self.degraded.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Scan segments chronologically, returning decoded entries with
    /// `timestamp >= since_ts`, up to `limit`. Malformed lines are
    /// skipped with a logged warning rather than failing the query.
    pub fn query(&self, since_ts: &str, limit: usize) -> Result<Vec<LoggedMessage>, StorageError> {
        let mut out = Vec::new();
        'segments: for segment in Self::list_segments(&self.logs_dir)? {
            let path = self.logs_dir.join(&segment);
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    warn!(segment = %segment, error = %e, "skipping unreadable segment");
                    continue;
                }
            };
            for (lineno, line) in BufReader::new(file).lines().enumerate() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        warn!(segment = %segment, line = lineno, error = %e, "skipping unreadable line");
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LoggedMessage>(&line) {
                    Ok(entry) => {
                        if entry.timestamp.as_str() >= since_ts {
                            out.push(entry);
                            if out.len() >= limit {
                                break 'segments;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(segment = %segment, line = lineno, error = %e, "skipping malformed log line");
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn current_segment_path(&self) -> &Path {
        &self.current_path
    }

    fn needs_rotation(&self, today: &str) -> bool {
        self.bytes >= self.config.max_bytes || self.lines >= self.config.max_lines || self.date != today
    }

    /// Create a new segment, fsync it, then atomically swap the pointer —
    /// the previous file closes when `self.file` is replaced.
    fn rotate(&mut self, now: DateTime<Utc>) -> Result<(), StorageError> {
        let segment_name = Self::new_segment_name(&now);
        let new_path = self.logs_dir.join(&segment_name);
        let new_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&new_path)?;
        new_file.sync_all()?;
        Self::write_pointer(&self.logs_dir, &segment_name)?;

        self.file = new_file;
        self.current_path = new_path;
        self.bytes = 0;
        self.lines = 0;
        self.date = now.format("%Y-%m-%d").to_string();
        Ok(())
    }

    fn write_line(&mut self, line: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(line)?;
        if self.config.fsync_every_append {
            self.file.sync_all()?;
        }
        Ok(())
    }

    fn write_pointer(logs_dir: &Path, segment_name: &str) -> Result<(), StorageError> {
        let tmp = logs_dir.join("current.tmp");
        std::fs::write(&tmp, segment_name)?;
        {
            let f = File::open(&tmp)?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp, logs_dir.join("current"))?;
        Ok(())
    }

    fn new_segment_name(now: &DateTime<Utc>) -> String {
        format!("messages_{}.jsonl", now.format("%Y-%m-%d_%H-%M-%S"))
    }

    fn list_segments(logs_dir: &Path) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(logs_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("messages_") && name.ends_with(".jsonl") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn find_latest_segment(logs_dir: &Path) -> Result<Option<String>, StorageError> {
        Ok(Self::list_segments(logs_dir)?.pop())
    }
}

fn date_component(segment_name: &str) -> String {
    segment_name
        .strip_prefix("messages_")
        .and_then(|s| s.get(0..10))
        .unwrap_or("")
        .to_string()
}

fn count_lines(path: &Path) -> Result<u64, StorageError> {
    let file = File::open(path)?;
    Ok(BufReader::new(file).lines().count() as u64)
}

#[cfg(test)]
#[path = "message_log_tests.rs"]
mod tests;
