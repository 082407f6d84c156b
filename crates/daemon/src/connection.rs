// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection WebSocket handling (§4.6): inbound frame decode and size
//! cap, idle timeout, heartbeat, and the single outbound queue every
//! project this connection joins broadcasts into. One task per
//! connection; nothing else writes to the sink, so a plain `select!`
//! loop needs no separate reader/writer split beyond the stream's own.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gwy_core::{ClientId, ErrorKind, Envelope, IdGen, ProjectId, UuidIdGen};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::dispatcher;
use crate::lifecycle::GatewayState;

/// Per-connection subscription and identity state, threaded through the
/// dispatcher so handlers can enforce the join requirement (§4.7) and the
/// connection loop knows what to unsubscribe on disconnect.
pub struct ConnState {
    pub client_id: ClientId,
    pub joined: HashSet<ProjectId>,
    msg_rate: RateWindow,
    join_leave_rate: RateWindow,
}

impl ConnState {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            joined: HashSet::new(),
            msg_rate: RateWindow::new(),
            join_leave_rate: RateWindow::new(),
        }
    }

    /// `true` if this connection is still under its inbound message rate
    /// cap (§5 "per-connection inbound message rate"); counts the call as
    /// one message either way.
    pub(crate) fn allow_message(&mut self, max_per_sec: u32) -> bool {
        self.msg_rate.allow(max_per_sec)
    }

    /// `true` if this connection is still under its project-join/leave
    /// rate cap (§5); counts the call as one join/leave either way.
    pub(crate) fn allow_join_leave(&mut self, max_per_sec: u32) -> bool {
        self.join_leave_rate.allow(max_per_sec)
    }
}

/// A one-second fixed window counting events against a per-second cap
/// (§5 rate limits). Resets when the window has elapsed rather than
/// tracking a precise sliding window — good enough to bound abuse without
/// per-message bookkeeping.
struct RateWindow {
    window_start: tokio::time::Instant,
    count: u32,
}

impl RateWindow {
    fn new() -> Self {
        Self { window_start: Instant::now(), count: 0 }
    }

    fn allow(&mut self, max_per_sec: u32) -> bool {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.count = 0;
        }
        if self.count >= max_per_sec {
            false
        } else {
            self.count += 1;
            true
        }
    }
}

/// Why the connection loop stopped, distinct from the websocket's own
/// close status — used only for the trailing log line.
#[derive(Debug)]
enum CloseReason {
    PeerClosed,
    SlowConsumer,
    IdleTimeout,
    OversizeFrame,
    TransportError,
}

/// Drive one accepted connection until it closes, then unsubscribe it
/// from every project it had joined.
pub async fn handle(state: Arc<GatewayState>, stream: WebSocketStream<TcpStream>, peer: SocketAddr) {
    let client_id = ClientId::new(UuidIdGen.next());
    info!(client = %client_id, %peer, "connection accepted");

    let (mut sink, mut source) = stream.split();
    let (tx, mut rx) = mpsc::channel::<Envelope>(state.config.queue_capacity);
    let (close_tx, mut close_rx) = mpsc::channel::<ErrorKind>(1);
    let mut conn = ConnState::new(client_id.clone());

    let mut idle = interval(state.config.idle_timeout);
    idle.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut heartbeat = interval(state.config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_activity = Instant::now();

    let reason = loop {
        tokio::select! {
            biased;

            signal = close_rx.recv() => {
                let _ = signal;
                break CloseReason::SlowConsumer;
            }

            Some(envelope) = rx.recv() => {
                if send(&mut sink, &envelope, state.config.write_timeout).await.is_err() {
                    break CloseReason::TransportError;
                }
            }

            _ = heartbeat.tick() => {
                let ping = Envelope::response("ping", None, None);
                if send(&mut sink, &ping, state.config.write_timeout).await.is_err() {
                    break CloseReason::TransportError;
                }
            }

            _ = idle.tick() => {
                if last_activity.elapsed() >= state.config.idle_timeout {
                    break CloseReason::IdleTimeout;
                }
            }

            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        if text.len() > state.config.max_inbound_bytes {
                            break CloseReason::OversizeFrame;
                        }
                        if is_pong(&text) {
                            continue;
                        }
                        handle_inbound(&state, &mut conn, &tx, &close_tx, &mut sink, &text, state.config.write_timeout).await;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        last_activity = Instant::now();
                        if bytes.len() > state.config.max_inbound_bytes {
                            break CloseReason::OversizeFrame;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        last_activity = Instant::now();
                        if sink.send(Message::Pong(payload)).await.is_err() {
                            break CloseReason::TransportError;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) => break CloseReason::PeerClosed,
                    Some(Err(e)) => {
                        warn!(client = %client_id, error = %e, "websocket read error");
                        break CloseReason::TransportError;
                    }
                    None => break CloseReason::PeerClosed,
                }
            }
        }
    };

    for project_id in conn.joined.drain() {
        if let Some(handle) = state.manager.get(&project_id) {
            gwy_engine::Router::new().unsubscribe(&handle, &conn.client_id);
        }
    }
    let _ = sink.send(Message::Close(None)).await;
    debug!(client = %client_id, ?reason, "connection closed");
}

/// App-level liveness reply (§6 ADDED liveness frames): a `pong` envelope
/// only resets the idle timer, already done above by the caller — it
/// never reaches the dispatcher.
fn is_pong(text: &str) -> bool {
    serde_json::from_str::<Envelope>(text).map(|e| e.kind == "pong").unwrap_or(false)
}

async fn handle_inbound(
    state: &Arc<GatewayState>,
    conn: &mut ConnState,
    tx: &mpsc::Sender<Envelope>,
    close_tx: &mpsc::Sender<ErrorKind>,
    sink: &mut futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>,
    text: &str,
    write_timeout: std::time::Duration,
) {
    let envelope = match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            let error = Envelope::response(
                "error",
                None,
                Some(serde_json::json!({
                    "code": ErrorKind::InvalidParameter.as_str(),
                    "message": format!("malformed envelope: {e}"),
                })),
            );
            let _ = send(sink, &error, write_timeout).await;
            return;
        }
    };

    if let Some(response) = dispatcher::dispatch(state, conn, tx, close_tx, envelope).await {
        let _ = send(sink, &response, write_timeout).await;
    }
}

async fn send(
    sink: &mut futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>,
    envelope: &Envelope,
    write_timeout: std::time::Duration,
) -> Result<(), ()> {
    let text = serde_json::to_string(envelope).map_err(|_| ())?;
    match tokio::time::timeout(write_timeout, sink.send(Message::Text(text.into()))).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
