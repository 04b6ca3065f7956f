// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `porthole` binary as a subprocess and exercises it over
//! HTTP and WebSocket.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `porthole` binary.
pub fn porthole_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("porthole")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `porthole` process that is killed on drop.
///
/// Each process gets its own temp dir for the tmux socket and the upload
/// directory, so no test can see another's state (or the user's tmux).
pub struct PortholeProcess {
    child: Child,
    port: u16,
    _dir: tempfile::TempDir,
}

impl PortholeProcess {
    pub fn start() -> anyhow::Result<Self> {
        let binary = porthole_binary();
        anyhow::ensure!(binary.exists(), "porthole binary not found at {}", binary.display());

        let port = free_port()?;
        let dir = tempfile::tempdir()?;
        let tmux_socket = dir.path().join("tmux.sock");
        let upload_dir = dir.path().join("uploads");

        let child = Command::new(binary)
            .args(["--host", "127.0.0.1"])
            .args(["--port", &port.to_string()])
            .arg("--tmux-socket")
            .arg(&tmux_socket)
            .arg("--upload-dir")
            .arg(&upload_dir)
            .args(["--poll-interval", "1"])
            .args(["--log-format", "text"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port, _dir: dir })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn ws_url(&self, pane: &str) -> String {
        format!("ws://127.0.0.1:{}/ws/{}", self.port, pane)
    }

    /// Poll the health endpoint until it answers or `timeout` elapses.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if reqwest::get(&url).await.is_ok_and(|r| r.status().is_success()) {
                return Ok(());
            }
            anyhow::ensure!(
                tokio::time::Instant::now() < deadline,
                "porthole never became healthy"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Send SIGTERM and wait for exit, returning the exit code.
    pub async fn terminate(&mut self) -> anyhow::Result<Option<i32>> {
        Command::new("kill").args(["-TERM", &self.child.id().to_string()]).status()?;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status.code());
            }
            anyhow::ensure!(
                tokio::time::Instant::now() < deadline,
                "process did not exit after SIGTERM"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for PortholeProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
