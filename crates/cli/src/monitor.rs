// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane presence poller.
//!
//! Periodically resolves the configured pane's PTY device path and emits
//! edge-triggered transitions (absent ↔ present, path changed) for the
//! session supervisor to act on.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::tmux::{PaneInfo, Tmux};

/// Depth of the monitor event channel. Overflow drops the newest event
/// without committing the observed state, so the next poll re-emits it.
const EVENT_CHANNEL_CAPACITY: usize = 8;

/// A pane presence transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneEvent {
    Present {
        path: PathBuf,
        cols: u16,
        rows: u16,
        /// True on first attach and whenever the device path differs from
        /// the previously observed one.
        path_changed: bool,
    },
    Absent,
}

/// Control handle for a running monitor task.
#[derive(Clone)]
pub struct MonitorHandle {
    last_path: Arc<Mutex<Option<PathBuf>>>,
    force: Arc<Notify>,
}

impl MonitorHandle {
    /// Trigger an immediate poll outside the tick schedule.
    pub fn force_check(&self) {
        self.force.notify_one();
    }

    /// Forget the observed path so the next poll re-emits `Present` with
    /// `path_changed`. Used by the supervisor after a failed attach.
    pub fn invalidate(&self) {
        *self.last_path.lock() = None;
    }
}

/// Periodic pane resolution against one tmux target.
pub struct PaneMonitor {
    tmux: Tmux,
    target: String,
    interval: Duration,
}

impl PaneMonitor {
    pub fn new(tmux: Tmux, target: String, interval: Duration) -> Self {
        Self { tmux, target, interval }
    }

    /// Start the poll loop. Runs until `cancel` fires or the receiver is
    /// dropped.
    pub fn spawn(self, cancel: CancellationToken) -> (mpsc::Receiver<PaneEvent>, MonitorHandle) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = MonitorHandle {
            last_path: Arc::new(Mutex::new(None)),
            force: Arc::new(Notify::new()),
        };
        let state = Arc::clone(&handle.last_path);
        let force = Arc::clone(&handle.force);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            let mut suspicious_logged: Option<PathBuf> = None;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                    _ = force.notified() => {}
                }

                let resolved = self.resolve(&mut suspicious_logged).await;
                let mut last = state.lock();
                let Some(event) = classify(last.as_deref(), resolved.as_ref()) else {
                    continue;
                };
                match tx.try_send(event) {
                    Ok(()) => *last = resolved.map(|info| info.tty),
                    Err(TrySendError::Full(ev)) => {
                        warn!(pane = %self.target, ?ev, "pane monitor event channel full, dropping");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            debug!(pane = %self.target, "pane monitor stopped");
        });

        (rx, handle)
    }

    /// Resolve the target pane, treating malformed device paths as absent.
    async fn resolve(&self, suspicious_logged: &mut Option<PathBuf>) -> Option<PaneInfo> {
        let info = self.tmux.pane_info(&self.target).await?;
        if !info.tty.starts_with("/dev") {
            if suspicious_logged.as_ref() != Some(&info.tty) {
                warn!(
                    target = %self.target,
                    path = %info.tty.display(),
                    "pane device path not under /dev, treating pane as absent",
                );
                *suspicious_logged = Some(info.tty.clone());
            }
            return None;
        }
        Some(info)
    }
}

/// Compute the transition between the last observed path and a freshly
/// resolved pane. `None` means no emission.
fn classify(last: Option<&std::path::Path>, resolved: Option<&PaneInfo>) -> Option<PaneEvent> {
    match (last, resolved) {
        (None, None) => None,
        (Some(_), None) => Some(PaneEvent::Absent),
        (last, Some(info)) => {
            if last == Some(info.tty.as_path()) {
                None
            } else {
                Some(PaneEvent::Present {
                    path: info.tty.clone(),
                    cols: info.cols,
                    rows: info.rows,
                    path_changed: true,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
