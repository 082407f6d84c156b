// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accept loop (§4.6): binds already done at startup, this just hands
//! each accepted socket off to its own connection task.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, warn};

use crate::connection;
use crate::lifecycle::GatewayState;

/// Accept connections until `shutdown` fires, upgrading each one to a
/// WebSocket and spawning [`connection::handle`] for it.
pub async fn run(state: Arc<GatewayState>, listener: TcpListener, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    match tokio_tungstenite::accept_async(stream).await {
                        Ok(ws) => connection::handle(state, ws, peer).await,
                        Err(e) => error!(%peer, error = %e, "websocket handshake failed"),
                    }
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
