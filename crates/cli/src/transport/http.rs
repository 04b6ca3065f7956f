// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::tmux::PaneListing;
use crate::transport::AppState;

/// Extensions accepted by the upload endpoint.
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];

/// Liveness probe.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "sessions": state.registry.session_count(),
    }))
}

/// One pane in the switcher listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaneEntry {
    /// The identifier to open a `/ws/{pane}` channel with.
    pub id: String,
    /// Foreground command running in the pane.
    pub command: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowGroup {
    pub index: u32,
    pub name: String,
    pub panes: Vec<PaneEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGroup {
    pub name: String,
    pub windows: Vec<WindowGroup>,
}

/// Panes currently visible to tmux, grouped by session and window.
/// An unreachable tmux server yields an empty list.
pub async fn panes(State(state): State<Arc<AppState>>) -> Json<Vec<SessionGroup>> {
    Json(group_panes(state.tmux.list_panes().await))
}

/// Group a flat `list-panes -a` result, preserving tmux's listing order.
fn group_panes(listings: Vec<PaneListing>) -> Vec<SessionGroup> {
    let mut groups: Vec<SessionGroup> = Vec::new();
    for pane in listings {
        let entry = PaneEntry { id: pane.target(), command: pane.command.clone(), active: pane.active };

        if groups.last().map(|g| g.name.as_str()) != Some(pane.session.as_str()) {
            groups.push(SessionGroup { name: pane.session.clone(), windows: Vec::new() });
        }
        let Some(group) = groups.last_mut() else { continue };

        if group.windows.last().map(|w| w.index) != Some(pane.window_index) {
            group.windows.push(WindowGroup {
                index: pane.window_index,
                name: pane.window_name.clone(),
                panes: Vec::new(),
            });
        }
        if let Some(window) = group.windows.last_mut() {
            window.panes.push(entry);
        }
    }
    groups
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Original filename; only its extension is used.
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file: String,
    pub size: usize,
}

/// Content-addressed upload: the body is stored once under
/// `hex(sha256(body)).<ext>`, so re-uploading identical content is a no-op.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response {
    let Some(ext) = allowed_extension(&query.filename) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "unsupported file extension"})),
        )
            .into_response();
    };

    let digest = Sha256::digest(&body);
    let name = format!("{digest:x}.{ext}");
    let path = state.upload_dir.join(&name);

    if let Err(e) = tokio::fs::create_dir_all(&state.upload_dir).await {
        warn!("upload dir unavailable: {e}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "upload directory unavailable"})),
        )
            .into_response();
    }
    if !path.exists() {
        if let Err(e) = tokio::fs::write(&path, &body).await {
            warn!("upload write failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "write failed"})),
            )
                .into_response();
        }
    }

    Json(UploadResponse { file: name, size: body.len() }).into_response()
}

/// Lower-cased extension of `filename` when it is on the allow-list.
fn allowed_extension(filename: &str) -> Option<String> {
    let ext = filename.rsplit_once('.')?.1.to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
