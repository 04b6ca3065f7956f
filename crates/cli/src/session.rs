// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One streaming session per pane: ring buffer, hub, bridge, monitor, and
//! the supervisor task tying them together.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bridge::{OutputFn, PaneBridge};
use crate::hub::Hub;
use crate::monitor::{MonitorHandle, PaneEvent, PaneMonitor};
use crate::protocol::{PaneState, ServerFrame};
use crate::ring::RingBuffer;
use crate::tmux::Tmux;

/// Per-session tunables, carried from the top-level config.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Ring buffer capacity in bytes.
    pub ring_size: usize,
    /// Per-subscriber outbound queue depth.
    pub client_queue_size: usize,
    /// Upper bound on a tail replay payload in bytes.
    pub tail_replay_size: usize,
    /// Scrollback lines included in a rendered tail capture.
    pub capture_scrollback: u32,
    /// Pane monitor poll interval.
    pub poll_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ring_size: 16 * 1024 * 1024,
            client_queue_size: 256,
            tail_replay_size: 256 * 1024,
            capture_scrollback: 500,
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// The live pipeline for one pane.
///
/// Owned by the [`SessionRegistry`](crate::registry::SessionRegistry);
/// everything inside is torn down when [`close`](Self::close) runs.
pub struct Session {
    target: String,
    settings: SessionSettings,
    tmux: Tmux,
    ring: Arc<Mutex<RingBuffer>>,
    hub: Arc<Hub>,
    bridge: Arc<PaneBridge>,
    monitor: MonitorHandle,
    cancel: CancellationToken,
}

impl Session {
    /// Build the session and start its monitor and supervisor tasks.
    pub fn spawn(tmux: Tmux, target: String, settings: SessionSettings) -> Arc<Self> {
        let cancel = CancellationToken::new();
        let ring = Arc::new(Mutex::new(RingBuffer::new(settings.ring_size)));
        let hub = Arc::new(Hub::new());

        // Ring append and broadcast happen in the same callback invocation
        // on the capture reader task, so a subscriber that observes output
        // at offset K can rely on the ring containing everything up to K.
        let on_output: OutputFn = {
            let ring = Arc::clone(&ring);
            let hub = Arc::clone(&hub);
            Arc::new(move |chunk: &[u8]| {
                ring.lock().append(chunk);
                hub.broadcast_output(chunk);
            })
        };

        let bridge = PaneBridge::new(tmux.clone(), target.clone(), on_output, cancel.clone());
        let monitor = PaneMonitor::new(tmux.clone(), target.clone(), settings.poll_interval);
        let (events, handle) = monitor.spawn(cancel.child_token());

        tokio::spawn(supervise(
            target.clone(),
            Arc::clone(&bridge),
            Arc::clone(&hub),
            handle.clone(),
            events,
            cancel.clone(),
        ));

        Arc::new(Self { target, settings, tmux, ring, hub, bridge, monitor: handle, cancel })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn tmux(&self) -> &Tmux {
        &self.tmux
    }

    pub fn ring(&self) -> &Mutex<RingBuffer> {
        &self.ring
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn bridge(&self) -> &Arc<PaneBridge> {
        &self.bridge
    }

    /// The session's lifecycle token; subscriber pumps run under child
    /// tokens of this.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Ask the monitor for an immediate poll.
    pub fn force_check(&self) {
        self.monitor.force_check();
    }

    /// Current pane status, recomputed by querying tmux for dimensions.
    pub async fn status(&self) -> ServerFrame {
        match self.tmux.pane_info(&self.target).await {
            Some(info) => ServerFrame::status(
                PaneState::Connected,
                self.bridge.epoch(),
                info.cols,
                info.rows,
            ),
            None => ServerFrame::status(PaneState::Missing, self.bridge.epoch(), 0, 0),
        }
    }

    /// Tear the session down: stop monitor, supervisor, and capture.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.bridge.detach().await;
    }
}

/// Consumes monitor events and drives bridge (re)attachment plus status
/// fan-out.
async fn supervise(
    target: String,
    bridge: Arc<PaneBridge>,
    hub: Arc<Hub>,
    monitor: MonitorHandle,
    mut events: mpsc::Receiver<PaneEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            ev = events.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
        };

        match event {
            PaneEvent::Present { path, cols, rows, path_changed } => {
                if !path_changed {
                    continue;
                }
                match bridge.reattach(&path).await {
                    Ok(()) => {
                        info!(
                            pane = %target,
                            path = %path.display(),
                            epoch = bridge.epoch(),
                            "pane attached",
                        );
                        hub.broadcast_status(PaneState::Connected, bridge.epoch(), cols, rows);
                    }
                    Err(e) => {
                        warn!(pane = %target, "pane attach failed: {e:#}");
                        // Forget the observed path so the next monitor
                        // tick re-emits it and the attach is retried.
                        monitor.invalidate();
                    }
                }
            }
            PaneEvent::Absent => {
                info!(pane = %target, "pane missing");
                bridge.detach().await;
                hub.broadcast_status(PaneState::Missing, bridge.epoch(), 0, 0);
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
