// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway lifecycle: startup, shutdown, crash recovery.

use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use gwy_adapters::ProcessAgentCli;
use gwy_core::{SystemClock, UuidIdGen};
use gwy_engine::{EngineError, Executor, ExecutorConfig, ProjectManager};
use gwy_storage::{MessageLogConfig, ProjectStore};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Daemon runtime with concrete clock/id-gen/agent-cli types.
pub type DaemonExecutor = Executor<SystemClock, UuidIdGen, ProcessAgentCli>;
pub type DaemonManager = ProjectManager<SystemClock, UuidIdGen>;

/// Gateway configuration, loaded entirely from environment variables with
/// hardcoded defaults (§1.1 — deliberately not a config-file parser).
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub lock_path: PathBuf,
    pub pid_path: PathBuf,
    pub log_path: PathBuf,
    pub max_projects: usize,
    pub queue_capacity: usize,
    pub max_inbound_bytes: usize,
    pub idle_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub write_timeout: Duration,
    pub max_messages_per_sec: u32,
    pub max_join_leave_per_sec: u32,
    pub executor: ExecutorConfig,
}

impl Config {
    /// Load configuration for the single gateway instance serving
    /// `data_dir` (§1.1, §6 on-disk layout).
    pub fn load() -> Result<Self, LifecycleError> {
        let data_dir = crate::env::data_dir()?;

        Ok(Self {
            lock_path: data_dir.join("gateway.lock"),
            pid_path: data_dir.join("gateway.pid"),
            log_path: data_dir.join("gateway.log"),
            bind_addr: crate::env::bind_addr()?,
            max_projects: crate::env::max_projects(),
            queue_capacity: crate::env::subscriber_queue_capacity(),
            max_inbound_bytes: crate::env::max_inbound_bytes(),
            idle_timeout: crate::env::idle_timeout(),
            heartbeat_interval: crate::env::heartbeat_interval(),
            write_timeout: crate::env::write_timeout(),
            max_messages_per_sec: crate::env::max_messages_per_sec(),
            max_join_leave_per_sec: crate::env::max_join_leave_per_sec(),
            executor: ExecutorConfig {
                agent_binary: crate::env::agent_binary(),
                execution_timeout: gwy_adapters::execution_timeout(),
                termination_grace: gwy_adapters::termination_grace(),
                max_concurrency: crate::env::max_concurrency(),
            },
            data_dir,
        })
    }
}

/// Gateway state during operation: the project manager, the executor, and
/// the file lock that guarantees at most one instance runs against
/// `data_dir` (§1.1 process supervision).
pub struct GatewayState {
    pub config: Config,
    #[allow(dead_code)]
    lock_file: File,
    pub manager: Arc<DaemonManager>,
    pub executor: Arc<DaemonExecutor>,
}

/// Result of gateway startup: the state plus the bound listener, returned
/// separately so the caller can spawn the accept loop as its own task.
pub struct StartupResult {
    pub gateway: GatewayState,
    pub listener: TcpListener,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine data directory")]
    NoStateDir,

    #[error("invalid GWY_BIND_ADDR: {0}")]
    InvalidBindAddr(String),

    #[error("failed to acquire lock: gateway already running against this data directory?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the gateway: acquire the single-instance lock, load projects from
/// disk, and bind the listener. Cleans up lock/pid files on any failure
/// other than losing the lock race itself.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.data_dir)?;

    // Acquire the lock file first, before anything else touches the data
    // directory — opened without truncating so a concurrent loser never
    // wipes the running instance's lock.
    let lock_file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    std::fs::write(&config.pid_path, std::process::id().to_string())?;

    let store = ProjectStore::new(config.data_dir.clone());
    let manager = Arc::new(ProjectManager::new(
        store,
        SystemClock,
        UuidIdGen,
        config.max_projects,
        MessageLogConfig::default(),
    ));
    let restored = manager.load_from_disk()?;
    info!(restored, "loaded projects from disk");

    let executor = Executor::new(Arc::clone(&manager), Arc::new(ProcessAgentCli), config.executor.clone());

    // Bind last, only after every fallible step has succeeded.
    let listener =
        TcpListener::bind(config.bind_addr).await.map_err(|e| LifecycleError::BindFailed(config.bind_addr, e))?;

    info!(addr = %config.bind_addr, "gateway started");

    Ok(StartupResult {
        gateway: GatewayState { config: config.clone(), lock_file, manager, executor },
        listener,
    })
}

impl GatewayState {
    /// Shutdown choreography (§5): terminate every active execution,
    /// release the lock, and remove the files that mark this instance as
    /// running. Connections are closed by the caller before this runs.
    pub async fn shutdown(&self) {
        info!("shutting down gateway");

        for view in self.manager.list() {
            if self.executor.is_active(&view.id) {
                if let Err(e) = self.executor.kill(&view.id) {
                    warn!(project = %view.id, error = %e, "failed to signal active execution during shutdown");
                }
            }
        }

        if self.config.pid_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.pid_path) {
                warn!(error = %e, "failed to remove pid file");
            }
        }
        // Lock file released automatically when `self.lock_file` drops.

        info!("gateway shutdown complete");
    }
}

fn cleanup_on_failure(config: &Config) {
    if config.pid_path.exists() {
        let _ = std::fs::remove_file(&config.pid_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
