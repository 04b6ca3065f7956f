// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP and WebSocket surface: router, shared state, handlers.

pub mod http;
pub mod ws;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::registry::SessionRegistry;
use crate::tmux::Tmux;

/// Shared state behind every handler.
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub tmux: Tmux,
    pub upload_dir: PathBuf,
    pub started_at: Instant,
}

/// Build the axum router with all HTTP and WebSocket routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/panes", get(http::panes))
        .route("/api/v1/upload", post(http::upload))
        .route("/ws/{pane}", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
