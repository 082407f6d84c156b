//! `agent_kill` terminates an in-flight execution (§4.4 `Kill`).

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn kill_terminates_a_running_execution() {
    let agent_dir = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent_sleeper(agent_dir.path());
    let gateway = Gateway::start_with(&[("GWY_AGENT_BINARY", agent.to_str().expect("utf8 path"))]);

    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;
    client.send("project_join", Some(&id), None).await;
    assert_eq!(client.recv().await["type"], "project_joined");

    client.send("execute", Some(&id), Some(json!({ "prompt": "long running" }))).await;
    assert_eq!(client.recv_kind("project_state").await["data"]["state"], "EXECUTING");

    client.send("agent_kill", Some(&id), None).await;

    let killed = client.recv_kind("agent_killed").await;
    assert_eq!(killed["project_id"], id);

    let final_state = client.recv_kind("project_state").await;
    assert_eq!(final_state["data"]["state"], "ERROR");
}

#[tokio::test]
async fn kill_without_an_active_execution_is_rejected() {
    let gateway = Gateway::start();
    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;

    client.send("agent_kill", Some(&id), None).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["data"]["code"], "process_not_active");
}
