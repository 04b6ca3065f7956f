// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `porthole` binary.
//!
//! These run against an isolated (and deliberately empty) tmux socket, so
//! they exercise startup, the HTTP surface, the WebSocket handshake, and
//! graceful shutdown without needing a tmux server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use porthole_specs::PortholeProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn http_health() -> anyhow::Result<()> {
    let porthole = PortholeProcess::start()?;
    porthole.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/health", porthole.base_url())).await?.json().await?;

    assert_eq!(resp["status"], "running");
    assert!(resp["uptime_secs"].is_number());
    assert!(resp["sessions"].is_number());
    Ok(())
}

#[tokio::test]
async fn http_panes_listing() -> anyhow::Result<()> {
    let porthole = PortholeProcess::start()?;
    porthole.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/panes", porthole.base_url())).await?.json().await?;

    assert_eq!(resp, serde_json::json!([]));
    Ok(())
}

#[tokio::test]
async fn ws_hello_gets_missing_status() -> anyhow::Result<()> {
    let porthole = PortholeProcess::start()?;
    porthole.wait_healthy(TIMEOUT).await?;

    let (stream, _) =
        tokio_tungstenite::connect_async(porthole.ws_url("ghost:0.0")).await?;
    let (mut tx, mut rx) = stream.split();

    let hello = serde_json::json!({"type": "hello", "replayMode": "tail"});
    tx.send(Message::Text(serde_json::to_string(&hello)?.into())).await?;

    let msg = tokio::time::timeout(TIMEOUT, rx.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("ws closed"))??;
    let Message::Text(text) = msg else { anyhow::bail!("expected text frame, got {msg:?}") };
    let frame: serde_json::Value = serde_json::from_str(&text)?;

    assert_eq!(frame["type"], "status");
    assert_eq!(frame["paneState"], "missing");
    assert_eq!(frame["epoch"], 0);
    Ok(())
}

#[tokio::test]
async fn ws_rejects_non_hello_first_frame() -> anyhow::Result<()> {
    let porthole = PortholeProcess::start()?;
    porthole.wait_healthy(TIMEOUT).await?;

    let (stream, _) =
        tokio_tungstenite::connect_async(porthole.ws_url("ghost:0.0")).await?;
    let (mut tx, mut rx) = stream.split();

    let not_hello = serde_json::json!({"type": "resize", "cols": 80, "rows": 24});
    tx.send(Message::Text(serde_json::to_string(&not_hello)?.into())).await?;

    let msg = tokio::time::timeout(TIMEOUT, rx.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("ws closed"))??;
    let Message::Text(text) = msg else { anyhow::bail!("expected text frame, got {msg:?}") };
    let frame: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(frame["type"], "error");
    Ok(())
}

#[tokio::test]
async fn sigterm_exits_zero() -> anyhow::Result<()> {
    let mut porthole = PortholeProcess::start()?;
    porthole.wait_healthy(TIMEOUT).await?;

    let code = porthole.terminate().await?;
    assert_eq!(code, Some(0));
    Ok(())
}
