// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;

use crate::subscriber;
use crate::transport::AppState;

/// WebSocket upgrade for one pane. The session is created lazily on the
/// first connection naming this pane identifier.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Path(pane): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let session = state.registry.get(&pane);
    // Don't make the first viewer wait out a full poll tick.
    session.force_check();
    ws.on_upgrade(move |socket| subscriber::run(session, socket))
}
