//! Nested project paths are rejected (§3 nesting invariant).

use crate::prelude::*;

#[tokio::test]
async fn project_cannot_be_created_inside_another() {
    let gateway = Gateway::start();
    let parent = tempfile::tempdir().expect("tempdir");
    let child = parent.path().join("nested");
    std::fs::create_dir(&child).expect("mkdir nested");

    let mut client = gateway.connect().await;
    let _parent_id = create_project(&mut client, parent.path()).await;

    client.send("project_create", None, Some(serde_json::json!({ "path": child.to_string_lossy() }))).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["data"]["code"], "project_nesting");
}

#[tokio::test]
async fn project_cannot_be_created_as_an_ancestor_of_another() {
    let gateway = Gateway::start();
    let parent = tempfile::tempdir().expect("tempdir");
    let child = parent.path().join("nested");
    std::fs::create_dir(&child).expect("mkdir nested");

    let mut client = gateway.connect().await;
    let _child_id = create_project(&mut client, &child).await;

    client.send("project_create", None, Some(serde_json::json!({ "path": parent.path().to_string_lossy() }))).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["data"]["code"], "project_nesting");
}

#[tokio::test]
async fn sibling_projects_are_allowed() {
    let gateway = Gateway::start();
    let root = tempfile::tempdir().expect("tempdir");
    let a = root.path().join("a");
    let b = root.path().join("b");
    std::fs::create_dir(&a).expect("mkdir a");
    std::fs::create_dir(&b).expect("mkdir b");

    let mut client = gateway.connect().await;
    let id_a = create_project(&mut client, &a).await;
    let id_b = create_project(&mut client, &b).await;
    assert_ne!(id_a, id_b);
}
