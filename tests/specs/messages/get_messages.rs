//! `get_messages` replays the project's JSONL log (§3, §4.1). Joining a
//! project never auto-replays history — a client must ask explicitly.

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn get_messages_returns_logged_agent_output() {
    let agent_dir = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent_success(agent_dir.path(), "sess-log");
    let gateway = Gateway::start_with(&[("GWY_AGENT_BINARY", agent.to_str().expect("utf8 path"))]);

    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;
    client.send("project_join", Some(&id), None).await;
    assert_eq!(client.recv().await["type"], "project_joined");

    client.send("execute", Some(&id), Some(json!({ "prompt": "hi" }))).await;
    client.recv_kind("project_state").await;
    client.recv_kind("agent_message").await;
    client.recv_kind("project_state").await;

    client.send("get_messages", Some(&id), None).await;
    let response = client.recv_kind("messages_response").await;
    let messages = response["data"]["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["direction"], "client");
    assert_eq!(messages[0]["message"]["prompt"], "hi");
    assert_eq!(messages[1]["direction"], "agent");
    assert_eq!(messages[1]["message"]["session_id"], "sess-log");
}

#[tokio::test]
async fn joining_a_project_does_not_replay_history() {
    let agent_dir = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent_success(agent_dir.path(), "sess-log");
    let gateway = Gateway::start_with(&[("GWY_AGENT_BINARY", agent.to_str().expect("utf8 path"))]);

    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut setup = gateway.connect().await;
    let id = create_project(&mut setup, project_dir.path()).await;
    setup.send("project_join", Some(&id), None).await;
    assert_eq!(setup.recv().await["type"], "project_joined");
    setup.send("execute", Some(&id), Some(json!({ "prompt": "hi" }))).await;
    setup.recv_kind("project_state").await;
    setup.recv_kind("agent_message").await;
    setup.recv_kind("project_state").await;
    setup.close().await;

    // A fresh connection joining later gets nothing until it asks.
    let mut late = gateway.connect().await;
    late.send("project_join", Some(&id), None).await;
    assert_eq!(late.recv().await["type"], "project_joined");

    late.send("get_messages", Some(&id), None).await;
    let response = late.recv_kind("messages_response").await;
    assert_eq!(response["data"]["messages"].as_array().expect("messages").len(), 2);
}
