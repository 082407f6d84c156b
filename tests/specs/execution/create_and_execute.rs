//! Create a project, join it, execute a prompt, observe the full
//! EXECUTING → IDLE round trip (§4.4, §4.7).

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn execute_streams_agent_output_and_returns_to_idle() {
    let agent_dir = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent_success(agent_dir.path(), "sess-abc");
    let gateway = Gateway::start_with(&[("GWY_AGENT_BINARY", agent.to_str().expect("utf8 path"))]);

    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;

    client.send("project_join", Some(&id), None).await;
    assert_eq!(client.recv().await["type"], "project_joined");

    client.send("execute", Some(&id), Some(json!({ "prompt": "hello" }))).await;

    let executing = client.recv_kind("project_state").await;
    assert_eq!(executing["data"]["state"], "EXECUTING");

    let message = client.recv_kind("agent_message").await;
    assert_eq!(message["data"]["session_id"], "sess-abc");

    let idle = client.recv_kind("project_state").await;
    assert_eq!(idle["data"]["state"], "IDLE");
    assert_eq!(idle["data"]["session_id"], "sess-abc");
}

#[tokio::test]
async fn execute_without_joining_is_rejected() {
    let gateway = Gateway::start();
    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;

    client.send("execute", Some(&id), Some(json!({ "prompt": "hello" }))).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["data"]["code"], "invalid_parameter");
}

#[tokio::test]
async fn execute_surfaces_agent_not_found() {
    let gateway = Gateway::start_with(&[("GWY_AGENT_BINARY", "/definitely/not/a/real/binary")]);
    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;

    client.send("project_join", Some(&id), None).await;
    assert_eq!(client.recv().await["type"], "project_joined");

    client.send("execute", Some(&id), Some(json!({ "prompt": "hello" }))).await;
    assert_eq!(client.recv_kind("project_state").await["data"]["state"], "EXECUTING");

    let error = client.recv_kind("error").await;
    assert_eq!(error["data"]["code"], "agent_not_found");

    let final_state = client.recv_kind("project_state").await;
    assert_eq!(final_state["data"]["state"], "ERROR");
}
