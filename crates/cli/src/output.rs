// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::ValueEnum;

/// Determine if color output should be enabled.
///
/// Delegates to [`crate::color::should_colorize`] — the single source of
/// truth for color detection across the CLI.
pub fn should_use_color() -> bool {
    crate::color::should_colorize()
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Format a duration in seconds the way `status` reports uptime.
pub fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{hours}h {mins}m {secs}s")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Display gateway log content, optionally following new lines as they're
/// appended (polling rather than a filesystem-watch crate — the admin CLI
/// has no other use for one).
pub async fn display_log(log_path: &std::path::Path, content: &str, follow: bool, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            if content.is_empty() {
                eprintln!("no log entries found at {}", log_path.display());
            } else {
                print!("{content}");
                if !content.ends_with('\n') {
                    println!();
                }
            }
            if follow {
                tail_file(log_path).await?;
            }
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "log_path": log_path.to_string_lossy(),
                "lines": content.lines().collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&obj)?);
            if follow {
                eprintln!("warning: --follow is not supported with --output json");
            }
        }
    }
    Ok(())
}

/// Poll a file for new lines appended after the current read position,
/// printing them until interrupted.
async fn tail_file(path: &std::path::Path) -> anyhow::Result<()> {
    use std::io::{BufRead, BufReader, Seek, SeekFrom};

    let mut file = std::fs::File::open(path).map_err(|_| anyhow::anyhow!("log file not found: {}", path.display()))?;
    file.seek(SeekFrom::End(0))?;
    let mut reader = BufReader::new(file);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let mut line = String::new();
        while reader.read_line(&mut line)? > 0 {
            print!("{line}");
            line.clear();
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(500)) => {}
            _ = &mut ctrl_c => break,
        }
    }

    Ok(())
}
