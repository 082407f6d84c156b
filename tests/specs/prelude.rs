//! Test helpers for gateway behavioral specifications.
//!
//! Black-box: spawn the real `gwyd` binary against a temp data directory,
//! speak the wire protocol over a real WebSocket, assert on what comes
//! back. No internal crate is linked in here.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::io::{BufRead, BufReader};
use std::net::TcpListener as StdTcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const READY_TIMEOUT: Duration = Duration::from_secs(10);
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the path to a binary, checking the llvm-cov target directory
/// first so coverage runs and plain `cargo test` both find it.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

pub fn gwyd_binary() -> PathBuf {
    binary_path("gwyd")
}

/// Bind an ephemeral port and immediately release it. Racy in theory,
/// good enough in practice for a test suite that doesn't run thousands
/// of gateways concurrently.
fn free_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local_addr").port()
}

/// Write a fake agent CLI to `dir` that behaves the way `script`
/// describes, and return its path. A shell script stands in for the
/// real agent binary the same way the engine's fakes stand in for it in
/// unit tests — only here the substitution happens at the process
/// boundary instead of the trait boundary.
pub fn fake_agent(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("fake-agent.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).expect("write fake agent");
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

/// A fake agent that prints one JSON event carrying `session_id` and
/// exits successfully.
pub fn fake_agent_success(dir: &Path, session_id: &str) -> PathBuf {
    fake_agent(dir, &format!(r#"echo '{{"session_id":"{session_id}","result":"ok"}}'"#))
}

/// A fake agent that sleeps long enough to be killed mid-execution.
pub fn fake_agent_sleeper(dir: &Path) -> PathBuf {
    fake_agent(dir, "sleep 30")
}

/// A fake agent that exits non-zero without producing any output.
pub fn fake_agent_failure(dir: &Path) -> PathBuf {
    fake_agent(dir, "echo 'boom' 1>&2\nexit 1")
}

/// A fake agent that appends its argument vector to `dir/invocations.log`
/// (one line per run) before emitting a session event, so a test can
/// assert on exactly what was passed across successive executions.
pub fn fake_agent_recording(dir: &Path, session_id: &str) -> PathBuf {
    let log = dir.join("invocations.log");
    fake_agent(
        dir,
        &format!(
            r#"echo "$@" >> {log}
echo '{{"session_id":"{session_id}","result":"ok"}}'"#,
            log = log.display(),
        ),
    )
}

/// Read the argument lines recorded by [`fake_agent_recording`].
pub fn recorded_invocations(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("invocations.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// A running `gwyd` process bound to its own temp data directory and an
/// ephemeral port, torn down on drop.
pub struct Gateway {
    child: Child,
    /// `None` only in the brief window inside `crash()` after the
    /// directory has been handed back to the caller.
    data_dir: Option<tempfile::TempDir>,
    pub addr: std::net::SocketAddr,
}

impl Gateway {
    /// Start a gateway with default tunables.
    pub fn start() -> Self {
        Self::start_with(&[])
    }

    /// Start a gateway with additional `GWY_*` environment overrides.
    pub fn start_with(extra_env: &[(&str, &str)]) -> Self {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let port = free_port();
        let addr: std::net::SocketAddr = format!("127.0.0.1:{port}").parse().expect("parse addr");

        let mut cmd = Command::new(gwyd_binary());
        cmd.env("GWY_DATA_DIR", data_dir.path())
            .env("GWY_BIND_ADDR", addr.to_string())
            .env("GWY_AGENT_BINARY", "/nonexistent/agent-not-configured")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in extra_env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().expect("spawn gwyd");
        wait_for_ready(&mut child);

        Self { child, data_dir: Some(data_dir), addr }
    }

    /// Resume a gateway against an existing data directory (crash
    /// recovery scenarios), reusing the same bind address.
    pub fn restart(data_dir: tempfile::TempDir, addr: std::net::SocketAddr, extra_env: &[(&str, &str)]) -> Self {
        let mut cmd = Command::new(gwyd_binary());
        cmd.env("GWY_DATA_DIR", data_dir.path())
            .env("GWY_BIND_ADDR", addr.to_string())
            .env("GWY_AGENT_BINARY", "/nonexistent/agent-not-configured")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in extra_env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().expect("spawn gwyd");
        wait_for_ready(&mut child);

        Self { child, data_dir: Some(data_dir), addr }
    }

    /// The data directory this instance is (or was) running against.
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_ref().expect("data_dir already taken by crash()").path()
    }

    /// Open a new client connection to this gateway.
    pub async fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.addr).await.expect("tcp connect");
        let url = format!("ws://{}/", self.addr);
        let (ws, _) = tokio_tungstenite::client_async(url, stream).await.expect("websocket handshake");
        Client { ws }
    }

    /// SIGKILL the process to simulate a crash, without running the
    /// normal shutdown choreography. The data directory and bind address
    /// survive for a subsequent `restart`.
    pub fn crash(&mut self) -> (tempfile::TempDir, std::net::SocketAddr) {
        let pid = self.child.id();
        let _ = Command::new("kill").args(["-9", &pid.to_string()]).status();
        let _ = self.child.wait();
        (self.data_dir.take().expect("data_dir already taken"), self.addr)
    }
}

fn wait_for_ready(child: &mut Child) {
    let stdout = child.stdout.take().expect("stdout piped");
    let mut reader = BufReader::new(stdout);
    let start = Instant::now();
    let mut line = String::new();

    loop {
        if start.elapsed() > READY_TIMEOUT {
            panic!("gwyd did not print READY within {READY_TIMEOUT:?}");
        }
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => panic!("gwyd exited before printing READY"),
            Ok(_) => {
                if line.trim() == "READY" {
                    return;
                }
            }
            Err(e) => panic!("failed to read gwyd stdout: {e}"),
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// One WebSocket client connection to a running gateway.
pub struct Client {
    ws: WebSocketStream<TcpStream>,
}

impl Client {
    pub async fn send(&mut self, kind: &str, project_id: Option<&str>, data: Option<Value>) {
        let mut envelope = json!({ "type": kind });
        if let Some(id) = project_id {
            envelope["project_id"] = json!(id);
        }
        if let Some(data) = data {
            envelope["data"] = data;
        }
        let text = serde_json::to_string(&envelope).expect("serialize envelope");
        self.ws.send(Message::Text(text.into())).await.expect("send frame");
    }

    /// Receive the next envelope, skipping server-initiated `ping`s.
    pub async fn recv(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream ended")
                .expect("websocket error");

            if let Message::Text(text) = frame {
                let value: Value = serde_json::from_str(&text).expect("parse envelope");
                if value.get("type").and_then(Value::as_str) == Some("ping") {
                    self.send("pong", None, None).await;
                    continue;
                }
                return value;
            }
        }
    }

    /// Receive envelopes until one matches `kind`, discarding the rest.
    /// Used when a broadcast (e.g. `project_state`) may arrive before or
    /// after the direct response to a request.
    pub async fn recv_kind(&mut self, kind: &str) -> Value {
        loop {
            let value = self.recv().await;
            if value.get("type").and_then(Value::as_str) == Some(kind) {
                return value;
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Create a project rooted at `path` and return its id.
pub async fn create_project(client: &mut Client, path: &Path) -> String {
    client.send("project_create", None, Some(json!({ "path": path.to_string_lossy() }))).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "project_state", "unexpected response: {response}");
    response["project_id"].as_str().expect("project_id").to_string()
}
