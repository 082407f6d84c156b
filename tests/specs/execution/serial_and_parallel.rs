//! One active execution per project, independent across projects (§4.4,
//! §9 "naturally expressed with a mutual-exclusion primitive owned by
//! the project").

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn second_execute_on_the_same_project_is_rejected() {
    let agent_dir = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent_sleeper(agent_dir.path());
    let gateway = Gateway::start_with(&[("GWY_AGENT_BINARY", agent.to_str().expect("utf8 path"))]);

    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;
    client.send("project_join", Some(&id), None).await;
    assert_eq!(client.recv().await["type"], "project_joined");

    client.send("execute", Some(&id), Some(json!({ "prompt": "first" }))).await;
    assert_eq!(client.recv_kind("project_state").await["data"]["state"], "EXECUTING");

    client.send("execute", Some(&id), Some(json!({ "prompt": "second" }))).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["data"]["code"], "process_active");

    client.send("agent_kill", Some(&id), None).await;
}

#[tokio::test]
async fn executions_on_different_projects_run_concurrently() {
    let agent_dir = tempfile::tempdir().expect("tempdir");
    let agent = fake_agent(agent_dir.path(), "sleep 1\necho '{\"session_id\":\"s\",\"result\":\"ok\"}'");
    let gateway = Gateway::start_with(&[("GWY_AGENT_BINARY", agent.to_str().expect("utf8 path"))]);

    let dir_a = tempfile::tempdir().expect("tempdir");
    let dir_b = tempfile::tempdir().expect("tempdir");
    let mut client_a = gateway.connect().await;
    let mut client_b = gateway.connect().await;
    let id_a = create_project(&mut client_a, dir_a.path()).await;
    let id_b = create_project(&mut client_b, dir_b.path()).await;

    client_a.send("project_join", Some(&id_a), None).await;
    assert_eq!(client_a.recv().await["type"], "project_joined");
    client_b.send("project_join", Some(&id_b), None).await;
    assert_eq!(client_b.recv().await["type"], "project_joined");

    let start = std::time::Instant::now();
    client_a.send("execute", Some(&id_a), Some(json!({ "prompt": "a" }))).await;
    client_b.send("execute", Some(&id_b), Some(json!({ "prompt": "b" }))).await;

    tokio::join!(drain_to_idle(&mut client_a), drain_to_idle(&mut client_b));

    // Run serially this would take ~2s; concurrently it stays well under.
    assert!(start.elapsed() < std::time::Duration::from_millis(1800), "executions did not overlap: {:?}", start.elapsed());
}

async fn drain_to_idle(client: &mut Client) {
    client.recv_kind("project_state").await;
    client.recv_kind("agent_message").await;
    let idle = client.recv_kind("project_state").await;
    assert_eq!(idle["data"]["state"], "IDLE");
}
