// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use gwy_daemon::lifecycle::{self, Config, LifecycleError};
use gwy_daemon::server;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("--version" | "-V") => {
            println!("gwyd {VERSION}");
            return;
        }
        Some("--help" | "-h") => {
            print_help();
            return;
        }
        Some(other) => {
            eprintln!("gwyd: unrecognized argument '{other}'");
            print_help();
            std::process::exit(2);
        }
        None => {}
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("gwyd: failed to start tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    std::process::exit(runtime.block_on(run()));
}

async fn run() -> i32 {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("gwyd: failed to load configuration: {e}");
            return 1;
        }
    };

    let _log_guard = setup_logging(&config);

    let started = match lifecycle::startup(&config).await {
        Ok(started) => started,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.pid_path).unwrap_or_else(|_| "unknown".to_string());
            eprintln!("gwyd: already running against {} (pid {})", config.data_dir.display(), pid.trim());
            return 1;
        }
        Err(e) => {
            eprintln!("gwyd: startup failed: {e}");
            return 1;
        }
    };

    let gateway = Arc::new(started.gateway);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let server_task = tokio::spawn(server::run(Arc::clone(&gateway), started.listener, shutdown_rx));

    println!("READY");
    tracing::info!(pid = std::process::id(), "gwyd ready");

    if let Err(e) = wait_for_shutdown_signal().await {
        eprintln!("gwyd: failed to install signal handler: {e}");
        return 1;
    }

    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = server_task.await;
    gateway.shutdown().await;

    0
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = term.recv() => {}
        _ = interrupt.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

fn setup_logging(config: &Config) -> WorkerGuard {
    let log_dir = config.log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let log_name = config.log_path.file_name().and_then(|n| n.to_str()).unwrap_or("gateway.log");
    let file_appender = tracing_appender::rolling::never(log_dir, log_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_env("GWY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

fn print_help() {
    println!(
        "gwyd {VERSION}\n\n\
         Usage: gwyd [--version] [--help]\n\n\
         Configuration is read entirely from GWY_* environment variables;\n\
         see gwy-daemon's env module for the full list."
    );
}
