// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gwy — admin CLI for the gateway daemon.
//!
//! Process lifecycle only (§1.1): start, stop, restart, status, logs. The
//! project/client wire protocol is served over the gateway's WebSocket
//! endpoint to the external UI clients that are out of scope here; this
//! binary never speaks it.

mod color;
mod commands;
mod env;
mod output;
mod process;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "gwy", version, about = "Admin CLI for the gateway daemon")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(flatten)]
    daemon: commands::daemon::DaemonArgs,
}

fn main() -> Result<()> {
    let command = Cli::command().styles(color::styles());
    let matches = command.get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(commands::daemon::run(cli.daemon, cli.output))
}
