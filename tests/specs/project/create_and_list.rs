//! project_create / project_list / project_delete (§4.3).

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn create_then_list_returns_the_project() {
    let gateway = Gateway::start();
    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;

    let id = create_project(&mut client, project_dir.path()).await;

    client.send("project_list", None, None).await;
    let response = client.recv_kind("project_list_response").await;
    let projects = response["data"]["projects"].as_array().expect("projects array");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["id"], id);
    assert_eq!(projects[0]["state"], "IDLE");
}

#[tokio::test]
async fn create_rejects_relative_paths() {
    let gateway = Gateway::start();
    let mut client = gateway.connect().await;

    client.send("project_create", None, Some(json!({ "path": "relative/path" }))).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["data"]["code"], "invalid_path");
}

#[tokio::test]
async fn delete_removes_the_project_and_notifies_subscribers() {
    let gateway = Gateway::start();
    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;

    client.send("project_join", Some(&id), None).await;
    assert_eq!(client.recv().await["type"], "project_joined");

    client.send("project_delete", Some(&id), None).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "project_deleted");
    assert_eq!(response["project_id"], id);

    client.send("project_list", None, None).await;
    let listed = client.recv_kind("project_list_response").await;
    assert!(listed["data"]["projects"].as_array().expect("projects").is_empty());
}

#[tokio::test]
async fn get_unknown_project_is_rejected() {
    let gateway = Gateway::start();
    let mut client = gateway.connect().await;

    client.send("project_join", Some("not-a-real-id"), None).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["data"]["code"], "project_not_found");
}
