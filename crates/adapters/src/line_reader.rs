// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A newline reader that rejects lines past a configured size instead of
//! growing its buffer without bound (§4.4: "reject lines exceeding a
//! configured max, default 1 MiB").

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Outcome of reading one line from an agent's stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// A complete, in-bounds line (newline stripped).
    Line(String),
    /// The line reached `max_len` bytes before a newline or EOF was seen.
    /// The remainder of the line is discarded up to the next newline.
    Oversize,
}

/// Read one line from `reader`, capping retained bytes at `max_len`.
///
/// Returns `Ok(None)` on a clean EOF with no pending bytes. An EOF after
/// partial, unterminated bytes still yields that partial line — the agent
/// CLI is expected to flush whole lines, but a killed process may not.
pub async fn read_line_bounded<R>(reader: &mut R, max_len: usize) -> std::io::Result<Option<LineOutcome>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::new();
    let mut overflowed = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if buf.is_empty() && !overflowed {
                None
            } else {
                Some(finish(buf, overflowed))
            });
        }

        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            if !overflowed {
                buf.extend_from_slice(&available[..pos]);
            }
            let consumed = pos + 1;
            reader.consume(consumed);
            return Ok(Some(finish(buf, overflowed)));
        }

        if !overflowed {
            if buf.len() + available.len() > max_len {
                overflowed = true;
            } else {
                buf.extend_from_slice(available);
            }
        }
        let consumed = available.len();
        reader.consume(consumed);
    }
}

fn finish(buf: Vec<u8>, overflowed: bool) -> LineOutcome {
    if overflowed {
        LineOutcome::Oversize
    } else {
        LineOutcome::Line(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
#[path = "line_reader_tests.rs"]
mod tests;
