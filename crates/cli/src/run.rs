// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level server runner — shared by `main` and integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::registry::SessionRegistry;
use crate::tmux::Tmux;
use crate::transport::{build_router, AppState};

/// A bound listener plus the shared state, ready to serve.
///
/// Returned by [`prepare`] so callers (tests included) can read the real
/// bound address and hold the shutdown token before serving.
pub struct PreparedServer {
    pub state: Arc<AppState>,
    pub addr: SocketAddr,
    listener: TcpListener,
    shutdown: CancellationToken,
}

impl PreparedServer {
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve until the shutdown token fires, then tear down all sessions.
    pub async fn serve(self) -> anyhow::Result<()> {
        let router = build_router(Arc::clone(&self.state));
        axum::serve(self.listener, router)
            .with_graceful_shutdown(self.shutdown.clone().cancelled_owned())
            .await?;
        self.state.registry.close_all().await;
        Ok(())
    }
}

/// Run the server to completion: the full production codepath.
pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);
    let prepared = prepare(&config).await?;
    spawn_signal_handler(prepared.shutdown_token());
    info!("listening on {}", prepared.addr);
    prepared.serve().await
}

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    // Priority: --log-level / PORTHOLE_LOG_LEVEL > RUST_LOG > "info".
    let filter = if std::env::var("PORTHOLE_LOG_LEVEL").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Bind the listener and build the shared state. Does not serve yet.
pub async fn prepare(config: &Config) -> anyhow::Result<PreparedServer> {
    let tmux = Tmux::new(config.tmux_socket.clone());

    // The target is advisory — pane validity is only ever checked by
    // resolution, so a missing session is a warning, not an error.
    if let Some(ref target) = config.tmux_target {
        if !tmux.has_session(target).await {
            warn!(session = target, "configured tmux session not found, waiting for it to appear");
        }
    }

    let registry = Arc::new(SessionRegistry::new(tmux.clone(), config.session_settings()));
    let state = Arc::new(AppState {
        registry,
        tmux,
        upload_dir: config.upload_dir.clone(),
        started_at: Instant::now(),
    });

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;

    Ok(PreparedServer { state, addr, listener, shutdown: CancellationToken::new() })
}

/// First SIGINT/SIGTERM triggers graceful shutdown; a second forces exit.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM again, forcing exit");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT again, forcing exit");
            }
        }
        std::process::exit(130);
    });
}
