//! Per-connection inbound message and project join/leave rate caps (§5).

use crate::prelude::*;

#[tokio::test]
async fn exceeding_the_message_rate_cap_returns_resource_limit() {
    let gateway = Gateway::start_with(&[("GWY_MAX_MSGS_PER_SEC", "2")]);
    let mut client = gateway.connect().await;

    client.send("project_list", None, None).await;
    assert_eq!(client.recv_kind("project_list_response").await["type"], "project_list_response");
    client.send("project_list", None, None).await;
    assert_eq!(client.recv_kind("project_list_response").await["type"], "project_list_response");

    client.send("project_list", None, None).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["data"]["code"], "resource_limit");
}

#[tokio::test]
async fn exceeding_the_join_leave_rate_cap_returns_resource_limit() {
    let gateway = Gateway::start_with(&[("GWY_MAX_JOIN_LEAVE_PER_SEC", "1")]);
    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;

    client.send("project_join", Some(&id), None).await;
    assert_eq!(client.recv().await["type"], "project_joined");

    client.send("project_leave", Some(&id), None).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["data"]["code"], "resource_limit");
}
