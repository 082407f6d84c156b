//! After an unclean shutdown, a fresh gateway restarted against the same
//! data directory recovers every project with valid on-disk metadata
//! (§4.3 `load_from_disk`, §8 "after restart, List() returns exactly the
//! set of projects with valid on-disk metadata").

use crate::prelude::*;

#[tokio::test]
async fn projects_survive_a_sigkill_and_restart() {
    let project_dir = tempfile::tempdir().expect("tempdir");
    let mut gateway = Gateway::start();
    let mut client = gateway.connect().await;
    let id = create_project(&mut client, project_dir.path()).await;
    client.close().await;

    let (data_dir, addr) = gateway.crash();

    let restarted = Gateway::restart(data_dir, addr, &[]);
    let mut client = restarted.connect().await;
    client.send("project_list", None, None).await;
    let response = client.recv_kind("project_list_response").await;
    let projects = response["data"]["projects"].as_array().expect("projects array");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["id"], id);
    assert_eq!(projects[0]["state"], "IDLE");
}

#[tokio::test]
async fn a_second_gateway_cannot_start_against_a_live_data_dir() {
    let gateway = Gateway::start();
    let data_dir = gateway.data_dir().to_path_buf();

    let output = std::process::Command::new(gwyd_binary())
        .env("GWY_DATA_DIR", &data_dir)
        .env("GWY_BIND_ADDR", "127.0.0.1:0")
        .output()
        .expect("spawn second gwyd");

    assert!(!output.status.success(), "a second instance against the same data dir must not start");
    assert!(String::from_utf8_lossy(&output.stderr).contains("already running"));
}
