// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::session::SessionSettings;

/// Web terminal for tmux panes.
#[derive(Debug, Parser)]
#[command(name = "porthole", version, about)]
pub struct Config {
    /// Host address to bind to.
    #[arg(long, env = "PORTHOLE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP port to listen on.
    #[arg(long, env = "PORTHOLE_PORT", default_value = "8080")]
    pub port: u16,

    /// Ring buffer capacity in bytes.
    #[arg(long, env = "PORTHOLE_RING_SIZE", default_value = "16777216")]
    pub ring_size: usize,

    /// Upper bound on a tail replay payload in bytes.
    #[arg(long, env = "PORTHOLE_TAIL_REPLAY_SIZE", default_value = "262144")]
    pub tail_replay_size: usize,

    /// Per-subscriber outbound queue depth.
    #[arg(long, env = "PORTHOLE_CLIENT_QUEUE_SIZE", default_value = "256")]
    pub client_queue_size: usize,

    /// Pre-created tmux session to point the frontend at.
    #[arg(long, env = "PORTHOLE_TMUX_TARGET")]
    pub tmux_target: Option<String>,

    /// tmux server socket path (`tmux -S`); defaults to the user's server.
    #[arg(long, env = "PORTHOLE_TMUX_SOCKET")]
    pub tmux_socket: Option<PathBuf>,

    /// Pane monitor poll interval in seconds.
    #[arg(long, env = "PORTHOLE_POLL_INTERVAL", default_value = "2")]
    pub poll_interval: u64,

    /// Scrollback lines included in a tail replay capture.
    #[arg(long, env = "PORTHOLE_CAPTURE_SCROLLBACK", default_value = "500")]
    pub capture_scrollback: u32,

    /// Directory for content-addressed uploads.
    #[arg(long, env = "PORTHOLE_UPLOAD_DIR", default_value = "./uploads")]
    pub upload_dir: PathBuf,

    /// Log format (json or text).
    #[arg(long, env = "PORTHOLE_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "PORTHOLE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ring_size == 0 {
            anyhow::bail!("--ring-size must be positive");
        }
        if self.tail_replay_size == 0 {
            anyhow::bail!("--tail-replay-size must be positive");
        }
        if self.client_queue_size == 0 {
            anyhow::bail!("--client-queue-size must be positive");
        }
        if self.poll_interval == 0 || self.poll_interval > 60 {
            anyhow::bail!("--poll-interval must be between 1 and 60 seconds");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    /// The per-session tunables derived from this config.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            ring_size: self.ring_size,
            client_queue_size: self.client_queue_size,
            tail_replay_size: self.tail_replay_size,
            capture_scrollback: self.capture_scrollback,
            poll_interval: Duration::from_secs(self.poll_interval),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
