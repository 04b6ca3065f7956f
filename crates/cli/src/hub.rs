// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber registry and non-blocking fan-out.
//!
//! Broadcasts iterate the registry under a read lock and `try_send` into
//! each subscriber's bounded queue. A full queue means the frame is
//! dropped for that subscriber only; after enough consecutive losses the
//! subscriber is evicted by cancelling its token. No subscriber can block
//! the capture path or any other subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::protocol::{PaneState, ServerFrame};

/// Dropped-frame count at which a slow subscriber is force-closed.
const EVICT_DROP_THRESHOLD: u32 = 10;

struct SubscriberHandle {
    tx: mpsc::Sender<ServerFrame>,
    dropped: AtomicU32,
    cancel: CancellationToken,
}

/// Registry of connected subscribers for one session.
#[derive(Default)]
pub struct Hub {
    subscribers: RwLock<HashMap<u64, SubscriberHandle>>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber's outbound queue and its cancellation token.
    /// Returns the id to [`unregister`](Self::unregister) with.
    pub fn register(&self, tx: mpsc::Sender<ServerFrame>, cancel: CancellationToken) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = SubscriberHandle { tx, dropped: AtomicU32::new(0), cancel };
        self.subscribers.write().insert(id, handle);
        id
    }

    pub fn unregister(&self, id: u64) {
        self.subscribers.write().remove(&id);
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Fan a chunk of pane output to every subscriber.
    pub fn broadcast_output(&self, data: &[u8]) {
        self.broadcast(ServerFrame::output(data));
    }

    /// Fan a lifecycle status to every subscriber.
    pub fn broadcast_status(&self, state: PaneState, epoch: u64, cols: u16, rows: u16) {
        self.broadcast(ServerFrame::status(state, epoch, cols, rows));
    }

    fn broadcast(&self, frame: ServerFrame) {
        let subscribers = self.subscribers.read();
        for (id, sub) in subscribers.iter() {
            match sub.tx.try_send(frame.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    let dropped = sub.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if dropped == EVICT_DROP_THRESHOLD {
                        warn!(subscriber = id, dropped, "slow subscriber, force-closing");
                        sub.cancel.cancel();
                    }
                }
                // Receiver gone; the subscriber is unwinding and will
                // unregister itself.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
