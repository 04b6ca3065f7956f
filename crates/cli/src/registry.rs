// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::session::{Session, SessionSettings};
use crate::tmux::Tmux;

/// Lazily-created cache of [`Session`]s keyed by pane identifier.
///
/// The registry is the sole owner of sessions: a session exists from the
/// first subscriber (or API call) that names its pane until `close` or
/// `close_all` drops it.
pub struct SessionRegistry {
    tmux: Tmux,
    settings: SessionSettings,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(tmux: Tmux, settings: SessionSettings) -> Self {
        Self { tmux, settings, sessions: Mutex::new(HashMap::new()) }
    }

    /// Return the session for `target`, creating it on first use.
    ///
    /// Pane identifiers are treated as opaque keys; validity is checked by
    /// the new session's monitor attempting resolution.
    pub fn get(&self, target: &str) -> Arc<Session> {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(target) {
            return Arc::clone(session);
        }
        info!(pane = target, "creating session");
        let session = Session::spawn(self.tmux.clone(), target.to_owned(), self.settings.clone());
        sessions.insert(target.to_owned(), Arc::clone(&session));
        session
    }

    /// The session for `target`, if one already exists.
    pub fn lookup(&self, target: &str) -> Option<Arc<Session>> {
        self.sessions.lock().get(target).cloned()
    }

    /// Destroy one session. Returns false if none existed.
    pub async fn close(&self, target: &str) -> bool {
        let session = self.sessions.lock().remove(target);
        match session {
            Some(session) => {
                session.close().await;
                true
            }
            None => false,
        }
    }

    /// Destroy every session. Called on shutdown.
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> =
            self.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.close().await;
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
