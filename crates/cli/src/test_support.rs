// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: in-process servers and isolated tmux
//! servers for integration tests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::registry::SessionRegistry;
use crate::session::SessionSettings;
use crate::tmux::Tmux;
use crate::transport::{build_router, AppState};

/// An in-process porthole server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    shutdown: CancellationToken,
    upload_tmp: tempfile::TempDir,
}

impl TestServer {
    /// Bind on `127.0.0.1:0` and serve in the background.
    pub async fn spawn(tmux: Tmux, settings: SessionSettings) -> anyhow::Result<Self> {
        let upload_dir = tempfile::tempdir()?;
        let registry = Arc::new(SessionRegistry::new(tmux.clone(), settings));
        let state = Arc::new(AppState {
            registry,
            tmux,
            upload_dir: upload_dir.path().to_path_buf(),
            started_at: Instant::now(),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();

        let router = build_router(Arc::clone(&state));
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(sd.cancelled_owned())
                .await;
        });

        Ok(Self { addr, state, shutdown, upload_tmp: upload_dir })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, pane: &str) -> String {
        format!("ws://{}/ws/{}", self.addr, pane)
    }

    /// Where this server stores uploads.
    pub fn upload_dir(&self) -> &std::path::Path {
        self.upload_tmp.path()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Whether a tmux binary is usable on this machine. Tests that need a real
/// multiplexer return early (with a note) when it isn't.
pub fn tmux_available() -> bool {
    Command::new("tmux")
        .arg("-V")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// RAII guard for an isolated tmux server + session in a temp dir.
///
/// Each guard gets its own `-S` socket, so tests run in parallel without
/// touching each other or the user's default server. Dropping the guard
/// kills the whole server.
pub struct TmuxTestServer {
    name: String,
    socket: PathBuf,
    _tmpdir: tempfile::TempDir,
}

impl TmuxTestServer {
    pub fn new(name: &str) -> anyhow::Result<Self> {
        let tmpdir = tempfile::tempdir()?;
        let socket = tmpdir.path().join("tmux.sock");

        let status = Command::new("tmux")
            .arg("-S")
            .arg(&socket)
            .args(["new-session", "-d", "-s", name, "-x", "80", "-y", "24"])
            .status()?;
        anyhow::ensure!(status.success(), "failed to create tmux session");

        Ok(Self { name: name.to_owned(), socket, _tmpdir: tmpdir })
    }

    pub fn tmux(&self) -> Tmux {
        Tmux::new(Some(self.socket.clone()))
    }

    pub fn socket(&self) -> &PathBuf {
        &self.socket
    }

    /// Target of the session's first pane.
    pub fn target(&self) -> String {
        format!("{}:0.0", self.name)
    }

    /// Run a shell command inside the pane by typing it.
    pub fn type_line(&self, line: &str) -> anyhow::Result<()> {
        let text = format!("{line}\r");
        let status = Command::new("tmux")
            .arg("-S")
            .arg(&self.socket)
            .args(["send-keys", "-l", "-t", &self.target(), "--", &text])
            .status()?;
        anyhow::ensure!(status.success(), "tmux send-keys failed");
        Ok(())
    }

    /// Destroy the session (the pane disappears).
    pub fn destroy(&self) -> anyhow::Result<()> {
        let status = Command::new("tmux")
            .arg("-S")
            .arg(&self.socket)
            .args(["kill-session", "-t", &self.name])
            .status()?;
        anyhow::ensure!(status.success(), "tmux kill-session failed");
        Ok(())
    }

    /// Recreate the identically-named session (a fresh pane appears).
    pub fn recreate(&self) -> anyhow::Result<()> {
        let status = Command::new("tmux")
            .arg("-S")
            .arg(&self.socket)
            .args(["new-session", "-d", "-s", &self.name, "-x", "80", "-y", "24"])
            .status()?;
        anyhow::ensure!(status.success(), "tmux new-session failed");
        Ok(())
    }
}

impl Drop for TmuxTestServer {
    fn drop(&mut self) {
        let _ = Command::new("tmux")
            .arg("-S")
            .arg(&self.socket)
            .args(["kill-server"])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();
    }
}
