// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project subscriber fan-out (§4.5). A subscriber's outbound queue is
//! bounded; a broadcast that cannot enqueue drops the slow consumer rather
//! than blocking — the log is the system of record, and a reconnecting
//! client catches up via `get_messages(since_ts)` (§9).

use gwy_core::{ClientId, Envelope, ErrorKind};
use tokio::sync::mpsc;

use crate::project_manager::{ProjectHandle, Subscriber};

/// Default capacity of a subscriber's outbound queue (§5: "e.g. 256 envelopes").
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Fan-out of project events to joined clients.
///
/// Holds no state of its own — subscriber sets live on the project handle
/// (§3 ownership: "the Router only reads the `subscribers` set"), so this
/// is a thin, cheaply-cloned façade over operations on a handle.
#[derive(Clone, Copy, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    /// Subscribe `client` to `project`. Idempotent: re-joining replaces the
    /// previous sender for the same client rather than duplicating it.
    pub fn subscribe(&self, project: &ProjectHandle, client: ClientId, subscriber: Subscriber) {
        project.subscribers.write().insert(client, subscriber);
    }

    /// Unsubscribe `client` from `project`. A no-op if not subscribed.
    pub fn unsubscribe(&self, project: &ProjectHandle, client: &ClientId) {
        project.subscribers.write().remove(client);
    }

    pub fn unsubscribe_all(&self, project: &ProjectHandle) -> Vec<(ClientId, Subscriber)> {
        project.subscribers.write().drain().collect()
    }

    /// Snapshot the subscriber set and enqueue `envelope` on each one's
    /// outbound queue. Subscribers whose queue is full (or already closed)
    /// are dropped from the project and told to close with `slow_consumer`
    /// (§5 backpressure policy) rather than stalling this broadcast.
    pub fn broadcast(&self, project: &ProjectHandle, envelope: &Envelope) {
        let snapshot: Vec<(ClientId, Subscriber)> =
            project.subscribers.read().iter().map(|(id, sub)| (id.clone(), sub.clone())).collect();

        let mut stale = Vec::new();
        for (client_id, subscriber) in snapshot {
            match subscriber.tx.try_send(envelope.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    let _ = subscriber.close_tx.try_send(ErrorKind::SlowConsumer);
                    stale.push(client_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    stale.push(client_id);
                }
            }
        }
        if !stale.is_empty() {
            let mut subscribers = project.subscribers.write();
            for client_id in stale {
                subscribers.remove(&client_id);
            }
        }
    }

    pub fn subscriber_count(&self, project: &ProjectHandle) -> usize {
        project.subscribers.read().len()
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
