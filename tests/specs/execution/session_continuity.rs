//! A second `execute` on the same project continues the session the
//! first run produced (§4.3 `UpdateSession`, §4.4 `-c` flag).

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn second_execution_passes_the_previous_session_id() {
    let agent_dir = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent_recording(agent_dir.path(), "sess-001");
    let gateway = Gateway::start_with(&[("GWY_AGENT_BINARY", agent.to_str().expect("utf8 path"))]);

    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;
    client.send("project_join", Some(&id), None).await;
    assert_eq!(client.recv().await["type"], "project_joined");

    client.send("execute", Some(&id), Some(json!({ "prompt": "first" }))).await;
    assert_eq!(client.recv_kind("project_state").await["data"]["state"], "EXECUTING");
    client.recv_kind("agent_message").await;
    assert_eq!(client.recv_kind("project_state").await["data"]["state"], "IDLE");

    client.send("execute", Some(&id), Some(json!({ "prompt": "second" }))).await;
    assert_eq!(client.recv_kind("project_state").await["data"]["state"], "EXECUTING");
    client.recv_kind("agent_message").await;
    assert_eq!(client.recv_kind("project_state").await["data"]["state"], "IDLE");

    let invocations = recorded_invocations(agent_dir.path());
    assert_eq!(invocations.len(), 2);
    assert!(!invocations[0].contains("-c "), "first run must not continue a session: {}", invocations[0]);
    assert!(invocations[1].contains("-c sess-001"), "second run must continue the session: {}", invocations[1]);
}

#[tokio::test]
async fn agent_new_session_clears_continuity() {
    let agent_dir = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent_recording(agent_dir.path(), "sess-001");
    let gateway = Gateway::start_with(&[("GWY_AGENT_BINARY", agent.to_str().expect("utf8 path"))]);

    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;
    client.send("project_join", Some(&id), None).await;
    assert_eq!(client.recv().await["type"], "project_joined");

    client.send("execute", Some(&id), Some(json!({ "prompt": "first" }))).await;
    assert_eq!(client.recv_kind("project_state").await["data"]["state"], "EXECUTING");
    client.recv_kind("agent_message").await;
    assert_eq!(client.recv_kind("project_state").await["data"]["state"], "IDLE");

    client.send("agent_new_session", Some(&id), None).await;
    let reset = client.recv_kind("session_reset").await;
    assert_eq!(reset["project_id"], id);
    client.recv_kind("project_state").await;

    client.send("execute", Some(&id), Some(json!({ "prompt": "second" }))).await;
    client.recv_kind("project_state").await;
    client.recv_kind("agent_message").await;
    client.recv_kind("project_state").await;

    let invocations = recorded_invocations(agent_dir.path());
    assert_eq!(invocations.len(), 2);
    assert!(!invocations[1].contains("-c "), "run after new_session must not continue: {}", invocations[1]);
}
