// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection state machine: hello → replay → live → closed.
//!
//! A subscriber only sees live traffic after its replay completed and it
//! registered with the hub, so replay bytes and live bytes never
//! interleave. Replay in tail mode deliberately avoids raw ring bytes — a
//! terminal emulator dropped into the middle of an escape stream cannot
//! reconstruct scroll regions or SGR state, so the pane's own rendered
//! capture is used instead, followed by a repaint nudge.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::{decode_input, ClientFrame, PaneState, ReplayMode, ServerFrame};
use crate::session::Session;

/// Maximum bytes per replay output frame.
const REPLAY_CHUNK: usize = 64 * 1024;

/// Delay between entering live mode and the tail-mode repaint nudge.
const REPAINT_NUDGE_DELAY: Duration = Duration::from_millis(200);

type WsTx = SplitSink<WebSocket, Message>;
type WsRx = SplitStream<WebSocket>;

/// Drive one browser connection against a session, from handshake to
/// deregistration.
pub async fn run(session: Arc<Session>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // WaitingHello: the first frame must be a well-formed hello.
    let (replay_mode, tail_size) = match await_hello(&mut ws_rx).await {
        Hello::Frame { replay_mode, tail_size } => (replay_mode, tail_size),
        Hello::Malformed => {
            let _ = send_frame(&mut ws_tx, &ServerFrame::error("expected hello frame")).await;
            return;
        }
        Hello::Gone => return,
    };

    // Replaying: no hub registration yet, no live traffic delivered.
    let replayed = match replay_mode {
        ReplayMode::Full => send_full_replay(&session, &mut ws_tx).await,
        ReplayMode::Tail => send_tail_replay(&session, tail_size, &mut ws_tx).await,
    };
    if replayed.is_err() {
        return;
    }

    // Live: register, then pump until either side goes away.
    let (queue_tx, mut queue_rx) = mpsc::channel(session.settings().client_queue_size);
    let cancel = session.cancellation().child_token();
    let id = session.hub().register(queue_tx, cancel.clone());
    debug!(pane = session.target(), subscriber = id, "subscriber live");

    let status = session.status().await;
    let pane_connected =
        matches!(status, ServerFrame::Status { pane_state: PaneState::Connected, .. });
    if send_frame(&mut ws_tx, &status).await.is_err() {
        session.hub().unregister(id);
        return;
    }

    // Tail replays paint the screen but not the program's terminal modes
    // (alternate screen, scroll regions, bracketed paste). A Ctrl-L a
    // moment after going live makes the program repaint itself through
    // the normal output path, installing that state.
    if replay_mode == ReplayMode::Tail && pane_connected {
        let bridge = Arc::clone(session.bridge());
        tokio::spawn(async move {
            tokio::time::sleep(REPAINT_NUDGE_DELAY).await;
            bridge.queue_input(Bytes::from_static(b"\x0c"));
        });
    }

    loop {
        tokio::select! {
            // Slow-eviction by the hub or session shutdown.
            _ = cancel.cancelled() => break,

            frame = queue_rx.recv() => match frame {
                Some(frame) => {
                    // A send into a stalled socket must not outlive the
                    // subscriber's eviction, so it races the token too.
                    let sent = tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = send_frame(&mut ws_tx, &frame) => result,
                    };
                    if sent.is_err() {
                        break;
                    }
                }
                None => break,
            },

            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_client_frame(&session, &text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }

    session.hub().unregister(id);
    debug!(pane = session.target(), subscriber = id, "subscriber closed");
}

enum Hello {
    Frame { replay_mode: ReplayMode, tail_size: Option<usize> },
    Malformed,
    Gone,
}

/// Wait for the opening frame. Transport-level ping/pong is skipped;
/// anything else that isn't a hello is a protocol violation.
async fn await_hello(ws_rx: &mut WsRx) -> Hello {
    loop {
        match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => {
                return match serde_json::from_str(&text) {
                    Ok(ClientFrame::Hello { replay_mode, tail_size }) => {
                        Hello::Frame { replay_mode, tail_size }
                    }
                    Ok(_) | Err(_) => Hello::Malformed,
                };
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Binary(_))) => return Hello::Malformed,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return Hello::Gone,
        }
    }
}

/// Live-mode client frames. Nothing here is fatal: bad input payloads and
/// unknown frames are logged and skipped.
fn handle_client_frame(session: &Session, text: &str) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Input { data }) => match decode_input(&data) {
            Ok(bytes) => session.bridge().queue_input(Bytes::from(bytes)),
            Err(e) => debug!(pane = session.target(), "undecodable input payload: {e}"),
        },
        Ok(ClientFrame::Resize { cols, rows }) => session.bridge().queue_resize(cols, rows),
        Ok(ClientFrame::Hello { .. }) => {
            debug!(pane = session.target(), "duplicate hello ignored");
        }
        Err(e) => debug!(pane = session.target(), "unparseable client frame: {e}"),
    }
}

/// Full replay: the ring's retained window, chunked into output frames.
async fn send_full_replay(session: &Session, ws_tx: &mut WsTx) -> Result<(), ()> {
    let (snapshot, _start) = session.ring().lock().snapshot();
    for chunk in snapshot.chunks(REPLAY_CHUNK) {
        send_frame(ws_tx, &ServerFrame::output(chunk)).await?;
    }
    Ok(())
}

/// Tail replay: a rendered snapshot of the visible pane plus scrollback,
/// painted from a neutral origin with the live cursor restored.
async fn send_tail_replay(
    session: &Session,
    tail_size: Option<usize>,
    ws_tx: &mut WsTx,
) -> Result<(), ()> {
    let cap = session.settings().tail_replay_size;
    let limit = tail_size.unwrap_or(cap).min(cap);
    let Some(payload) = render_tail(session, limit).await else {
        // Pane absent: empty replay, the status frame tells the story.
        return Ok(());
    };
    for chunk in payload.chunks(REPLAY_CHUNK) {
        send_frame(ws_tx, &ServerFrame::output(chunk)).await?;
    }
    Ok(())
}

async fn render_tail(session: &Session, limit: usize) -> Option<Vec<u8>> {
    let tmux = session.tmux();
    let target = session.target();
    let captured = tmux
        .capture_rendered(target, session.settings().capture_scrollback)
        .await
        .ok()?;

    let mut body = normalise_line_ends(&captured);
    if body.len() > limit {
        body.drain(..body.len() - limit);
    }

    let mut payload = Vec::with_capacity(body.len() + 16);
    payload.extend_from_slice(b"\x1b[H");
    payload.extend_from_slice(&body);
    if let Some((x, y)) = tmux.cursor(target).await {
        payload.extend_from_slice(format!("\x1b[{};{}H", y + 1, x + 1).as_bytes());
    }
    Some(payload)
}

/// `capture-pane -p` terminates lines with bare LF; terminals need CR+LF.
fn normalise_line_ends(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 16);
    for &b in data {
        if b == b'\n' {
            out.extend_from_slice(b"\r\n");
        } else {
            out.push(b);
        }
    }
    out
}

async fn send_frame(ws_tx: &mut WsTx, frame: &ServerFrame) -> Result<(), ()> {
    let text = serde_json::to_string(frame).map_err(|_| ())?;
    ws_tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "subscriber_tests.rs"]
mod tests;
