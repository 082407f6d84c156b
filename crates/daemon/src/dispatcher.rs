// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message dispatcher (§4.7): maps an inbound envelope's `type` to a
//! handler, validating before any mutation and always producing a typed
//! response (or nothing, when the effect is already visible as a
//! broadcast the requester will receive on its own queue).

use gwy_core::{Direction, ErrorKind, Envelope, ExecuteOptions, GatewayError, ProjectId};
use gwy_engine::{EngineError, Router, Subscriber};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::connection::ConnState;
use crate::lifecycle::GatewayState;

/// Handle one inbound envelope. `tx`/`close_tx` are this connection's
/// outbound queue and slow-consumer signal, registered with the router on
/// every `project_join`.
pub async fn dispatch(
    state: &GatewayState,
    conn: &mut ConnState,
    tx: &mpsc::Sender<Envelope>,
    close_tx: &mpsc::Sender<ErrorKind>,
    envelope: Envelope,
) -> Option<Envelope> {
    if !conn.allow_message(state.config.max_messages_per_sec) {
        return Some(error_envelope(envelope.project_id, resource_limit("inbound message rate exceeded")));
    }
    if matches!(envelope.kind.as_str(), "project_join" | "project_leave")
        && !conn.allow_join_leave(state.config.max_join_leave_per_sec)
    {
        return Some(error_envelope(envelope.project_id, resource_limit("project join/leave rate exceeded")));
    }

    match envelope.kind.as_str() {
        "project_create" => Some(handle_project_create(state, envelope.data)),
        "project_delete" => Some(handle_project_delete(state, envelope.project_id)),
        "project_list" => Some(handle_project_list(state)),
        "project_join" => Some(handle_project_join(state, conn, tx, close_tx, envelope.project_id)),
        "project_leave" => Some(handle_project_leave(state, conn, envelope.project_id)),
        "execute" => handle_execute(state, conn, envelope.project_id, envelope.data).await,
        "agent_kill" => handle_agent_kill(state, envelope.project_id),
        "agent_new_session" => Some(handle_agent_new_session(state, envelope.project_id)),
        "get_messages" => Some(handle_get_messages(state, envelope.project_id, envelope.data)),
        other => Some(error_envelope(envelope.project_id, GatewayError::new(
            ErrorKind::InvalidParameter,
            format!("unknown message type '{other}'"),
        ))),
    }
}

fn handle_project_create(state: &GatewayState, data: Option<Value>) -> Envelope {
    let path = match data.as_ref().and_then(|d| d.get("path")).and_then(Value::as_str) {
        Some(path) => path,
        None => {
            return error_envelope(None, GatewayError::new(ErrorKind::InvalidParameter, "project_create requires a 'path' field"));
        }
    };

    match state.manager.create(path) {
        Ok(view) => Envelope::response("project_state", Some(view.id.clone()), Some(project_state_payload(&view))),
        Err(e) => error_envelope(None, e.into()),
    }
}

fn handle_project_delete(state: &GatewayState, project_id: Option<ProjectId>) -> Envelope {
    let Some(id) = project_id else {
        return error_envelope(None, missing_project_id());
    };

    match state.manager.delete(&id) {
        Ok(handle) => {
            let router = Router::new();
            for (_client, subscriber) in router.unsubscribe_all(&handle) {
                let _ = subscriber.tx.try_send(Envelope::response("project_deleted", Some(id.clone()), None));
            }
            Envelope::response("project_deleted", Some(id), None)
        }
        Err(e) => error_envelope(Some(id), e.into()),
    }
}

fn handle_project_list(state: &GatewayState) -> Envelope {
    let projects: Vec<Value> = state.manager.list().iter().map(project_state_payload).collect();
    Envelope::response("project_list_response", None, Some(json!({ "projects": projects })))
}

fn handle_project_join(
    state: &GatewayState,
    conn: &mut ConnState,
    tx: &mpsc::Sender<Envelope>,
    close_tx: &mpsc::Sender<ErrorKind>,
    project_id: Option<ProjectId>,
) -> Envelope {
    let Some(id) = project_id else {
        return error_envelope(None, missing_project_id());
    };

    let handle = match state.manager.get_or_not_found(&id) {
        Ok(handle) => handle,
        Err(e) => return error_envelope(Some(id), e.into()),
    };

    Router::new().subscribe(&handle, conn.client_id.clone(), Subscriber { tx: tx.clone(), close_tx: close_tx.clone() });
    conn.joined.insert(id.clone());
    Envelope::response("project_joined", Some(id), None)
}

fn handle_project_leave(state: &GatewayState, conn: &mut ConnState, project_id: Option<ProjectId>) -> Envelope {
    let Some(id) = project_id else {
        return error_envelope(None, missing_project_id());
    };
    if !conn.joined.contains(&id) {
        return error_envelope(Some(id), GatewayError::new(ErrorKind::InvalidParameter, "not joined to this project"));
    }

    if let Some(handle) = state.manager.get(&id) {
        Router::new().unsubscribe(&handle, &conn.client_id);
    }
    conn.joined.remove(&id);
    Envelope::response("project_left", Some(id), None)
}

async fn handle_execute(
    state: &GatewayState,
    conn: &ConnState,
    project_id: Option<ProjectId>,
    data: Option<Value>,
) -> Option<Envelope> {
    let id = match project_id {
        Some(id) => id,
        None => return Some(error_envelope(None, missing_project_id())),
    };
    if !conn.joined.contains(&id) {
        return Some(error_envelope(Some(id), GatewayError::new(ErrorKind::InvalidParameter, "must join the project before executing")));
    }

    let handle = match state.manager.get_or_not_found(&id) {
        Ok(handle) => handle,
        Err(e) => return Some(error_envelope(Some(id), e.into())),
    };

    let prompt = match data.as_ref().and_then(|d| d.get("prompt")).and_then(Value::as_str) {
        Some(p) => p.to_string(),
        None => return Some(error_envelope(Some(id), GatewayError::new(ErrorKind::InvalidParameter, "execute requires a 'prompt' field"))),
    };
    let options: ExecuteOptions = match data.as_ref().and_then(|d| d.get("options")) {
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(options) => options,
            Err(e) => return Some(error_envelope(Some(id), GatewayError::new(ErrorKind::InvalidParameter, e.to_string()))),
        },
        None => ExecuteOptions::default(),
    };

    if let Err(e) = handle.log.lock().append(Direction::Client, json!({ "prompt": prompt, "options": &options })) {
        tracing::warn!(project = %id, error = %e, "failed to log client execute request");
    }

    match state.executor.execute(handle, prompt, options).await {
        Ok(()) => None,
        Err(e) => Some(error_envelope(Some(id), e.into())),
    }
}

fn handle_agent_kill(state: &GatewayState, project_id: Option<ProjectId>) -> Option<Envelope> {
    let Some(id) = project_id else {
        return Some(error_envelope(None, missing_project_id()));
    };
    match state.executor.kill(&id) {
        Ok(()) => None,
        Err(e) => Some(error_envelope(Some(id), e.into())),
    }
}

fn handle_agent_new_session(state: &GatewayState, project_id: Option<ProjectId>) -> Envelope {
    let Some(id) = project_id else {
        return error_envelope(None, missing_project_id());
    };
    match state.manager.clear_session(&id) {
        Ok(()) => {
            let router = Router::new();
            if let Some(handle) = state.manager.get(&id) {
                router.broadcast(&handle, &Envelope::response("project_state", Some(id.clone()), Some(json!({ "state": "IDLE" }))));
            }
            Envelope::response("session_reset", Some(id), None)
        }
        Err(e) => error_envelope(Some(id), e.into()),
    }
}

fn handle_get_messages(state: &GatewayState, project_id: Option<ProjectId>, data: Option<Value>) -> Envelope {
    let Some(id) = project_id else {
        return error_envelope(None, missing_project_id());
    };
    let handle = match state.manager.get_or_not_found(&id) {
        Ok(handle) => handle,
        Err(e) => return error_envelope(Some(id), e.into()),
    };

    let since_ts = data.as_ref().and_then(|d| d.get("since_ts")).and_then(Value::as_str).unwrap_or("").to_string();
    let limit = data.as_ref().and_then(|d| d.get("limit")).and_then(Value::as_u64).unwrap_or(1000) as usize;

    match handle.log.lock().query(&since_ts, limit) {
        Ok(messages) => Envelope::response("messages_response", Some(id), Some(json!({ "messages": messages }))),
        Err(e) => error_envelope(Some(id), EngineError::from(e).into()),
    }
}

fn project_state_payload(view: &gwy_engine::ProjectView) -> Value {
    json!({
        "id": view.id,
        "path": view.path,
        "state": view.state,
        "session_id": view.session_id,
        "created_at": view.created_at,
        "last_active_at": view.last_active_at,
    })
}

fn missing_project_id() -> GatewayError {
    GatewayError::new(ErrorKind::InvalidParameter, "this message type requires 'project_id'")
}

fn resource_limit(message: &str) -> GatewayError {
    GatewayError::new(ErrorKind::ResourceLimit, message)
}

fn error_envelope(project_id: Option<ProjectId>, err: GatewayError) -> Envelope {
    let mut data = json!({ "code": err.kind.as_str(), "message": err.message });
    if let Some(details) = err.details {
        data["details"] = details;
    }
    Envelope::response("error", project_id, Some(data))
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
