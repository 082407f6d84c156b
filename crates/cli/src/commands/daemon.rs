// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gwy` — process lifecycle for the gateway daemon (§1.1 Admin CLI).
//!
//! This is the entire surface of the admin CLI: start/stop/restart/status
//! and a log viewer. It never opens a WebSocket connection itself — the
//! project/client wire protocol (§6) belongs to the external UI clients
//! this gateway serves, not to its own operator tooling.

use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use gwy_daemon::lifecycle::Config;

use crate::output::{display_log, format_uptime, OutputFormat};
use crate::process;

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the gateway (background by default)
    Start {
        /// Run in the foreground instead of detaching
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the gateway
    Stop,
    /// Stop then start the gateway
    Restart,
    /// Report whether the gateway is running, and where
    Status,
    /// View the gateway's log file
    Logs {
        /// Number of trailing lines to show
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
        /// Show the whole file, ignoring --limit
        #[arg(long, conflicts_with = "limit")]
        no_limit: bool,
        /// Keep printing new lines as they're appended
        #[arg(long, short)]
        follow: bool,
    },
}

pub async fn run(args: DaemonArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        Command::Start { foreground } => start(foreground).await,
        Command::Stop => stop().await,
        Command::Restart => restart().await,
        Command::Status => status(format).await,
        Command::Logs { limit, no_limit, follow } => logs(limit, no_limit, follow, format).await,
    }
}

async fn start(foreground: bool) -> Result<()> {
    let config = Config::load()?;

    if foreground {
        let gwyd = process::find_gwyd_binary();
        let status = std::process::Command::new(&gwyd).status().map_err(|e| anyhow!("failed to run {}: {e}", gwyd.display()))?;
        if !status.success() {
            return Err(anyhow!("gateway exited with {status}"));
        }
        return Ok(());
    }

    if let Some(pid) = process::read_pid(&config.pid_path) {
        if process::process_exists(pid) {
            println!("gateway already running (pid {pid})");
            return Ok(());
        }
    }

    let mut child = process::spawn_background()?;
    let addr = config.bind_addr;
    let deadline = std::time::Instant::now() + crate::env::wait_timeout();

    loop {
        if process::probe_listening(addr).await {
            println!("gateway started, listening on {addr}");
            return Ok(());
        }
        if let Ok(Some(status)) = child.try_wait() {
            return Err(anyhow!("gateway exited immediately ({status}); see `gwy logs`"));
        }
        if std::time::Instant::now() >= deadline {
            return Err(anyhow!("gateway did not start listening on {addr} within the timeout; see `gwy logs`"));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn stop() -> Result<()> {
    let config = Config::load()?;
    let Some(pid) = process::read_pid(&config.pid_path) else {
        println!("gateway not running");
        return Ok(());
    };
    if !process::process_exists(pid) {
        println!("gateway not running");
        cleanup_stale_files(&config);
        return Ok(());
    }

    process::terminate(pid);
    if !process::wait_until(crate::env::wait_timeout(), || !process::process_exists(pid)).await {
        process::force_kill(pid);
        process::wait_until(crate::env::wait_timeout(), || !process::process_exists(pid)).await;
    }
    cleanup_stale_files(&config);

    println!("gateway stopped");
    Ok(())
}

async fn restart() -> Result<()> {
    stop().await?;
    start(false).await
}

async fn status(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let running = process::read_pid(&config.pid_path).filter(|pid| process::process_exists(*pid));

    match (format, running) {
        (OutputFormat::Text, Some(pid)) => {
            println!("status: running");
            println!("pid: {pid}");
            println!("data dir: {}", config.data_dir.display());
            println!("listening: {}", config.bind_addr);
        }
        (OutputFormat::Text, None) => println!("status: not running"),
        (OutputFormat::Json, Some(pid)) => {
            let obj = serde_json::json!({
                "status": "running",
                "pid": pid,
                "data_dir": config.data_dir,
                "bind_addr": config.bind_addr.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&obj)?);
        }
        (OutputFormat::Json, None) => {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "status": "not_running" }))?);
        }
    }
    Ok(())
}

async fn logs(limit: usize, no_limit: bool, follow: bool, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let log_path = &config.log_path;

    if !log_path.exists() {
        return display_log(log_path, "", follow, format).await;
    }

    let content = if no_limit { std::fs::read_to_string(log_path)? } else { read_last_lines(log_path, limit)? };
    display_log(log_path, &content, follow, format).await
}

fn cleanup_stale_files(config: &Config) {
    if config.pid_path.exists() {
        let _ = std::fs::remove_file(&config.pid_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

fn read_last_lines(path: &std::path::Path, n: usize) -> Result<String> {
    use std::io::{BufRead, BufReader};
    let file = std::fs::File::open(path)?;
    let lines: Vec<String> = BufReader::new(file).lines().collect::<std::io::Result<_>>()?;
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
