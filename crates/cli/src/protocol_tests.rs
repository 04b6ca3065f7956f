// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn hello_full() -> anyhow::Result<()> {
    let frame: ClientFrame = serde_json::from_str(r#"{"type":"hello","replayMode":"full"}"#)?;
    assert_eq!(frame, ClientFrame::Hello { replay_mode: ReplayMode::Full, tail_size: None });
    Ok(())
}

#[test]
fn hello_tail_with_size() -> anyhow::Result<()> {
    let frame: ClientFrame =
        serde_json::from_str(r#"{"type":"hello","replayMode":"tail","tailSize":4096}"#)?;
    assert_eq!(
        frame,
        ClientFrame::Hello { replay_mode: ReplayMode::Tail, tail_size: Some(4096) }
    );
    Ok(())
}

#[test]
fn hello_unknown_mode_falls_back_to_tail() -> anyhow::Result<()> {
    let frame: ClientFrame =
        serde_json::from_str(r#"{"type":"hello","replayMode":"screenful"}"#)?;
    assert_eq!(frame, ClientFrame::Hello { replay_mode: ReplayMode::Tail, tail_size: None });
    Ok(())
}

#[test]
fn hello_defaults_to_tail() -> anyhow::Result<()> {
    let frame: ClientFrame = serde_json::from_str(r#"{"type":"hello"}"#)?;
    assert_eq!(frame, ClientFrame::Hello { replay_mode: ReplayMode::Tail, tail_size: None });
    Ok(())
}

#[test]
fn input_round_trip() -> anyhow::Result<()> {
    let frame: ClientFrame = serde_json::from_str(r#"{"type":"input","data":"bHMK"}"#)?;
    match frame {
        ClientFrame::Input { data } => assert_eq!(decode_input(&data)?, b"ls\n".to_vec()),
        other => anyhow::bail!("unexpected frame: {other:?}"),
    }
    Ok(())
}

#[test]
fn invalid_base64_input_is_rejected() {
    assert!(decode_input("not base64!").is_err());
}

#[test]
fn resize_frame() -> anyhow::Result<()> {
    let frame: ClientFrame = serde_json::from_str(r#"{"type":"resize","cols":132,"rows":43}"#)?;
    assert_eq!(frame, ClientFrame::Resize { cols: 132, rows: 43 });
    Ok(())
}

#[test]
fn unknown_type_is_an_error() {
    assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shout","data":"x"}"#).is_err());
    assert!(serde_json::from_str::<ClientFrame>(r#"{"data":"x"}"#).is_err());
}

#[test]
fn output_frame_encodes_base64() -> anyhow::Result<()> {
    let json = serde_json::to_string(&ServerFrame::output(b"\x1b[31mRED\x1b[0m"))?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(value["type"], "output");
    assert_eq!(decode_input(value["data"].as_str().unwrap_or_default())?, b"\x1b[31mRED\x1b[0m");
    Ok(())
}

#[test]
fn status_frame_uses_camel_case_keys() -> anyhow::Result<()> {
    let json = serde_json::to_string(&ServerFrame::status(PaneState::Connected, 3, 80, 24))?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(value["type"], "status");
    assert_eq!(value["paneState"], "connected");
    assert_eq!(value["epoch"], 3);
    assert_eq!(value["cols"], 80);
    assert_eq!(value["rows"], 24);
    Ok(())
}

#[test]
fn missing_status_serialises() -> anyhow::Result<()> {
    let json = serde_json::to_string(&ServerFrame::status(PaneState::Missing, 0, 0, 0))?;
    assert!(json.contains(r#""paneState":"missing""#));
    Ok(())
}

#[test]
fn error_frame() -> anyhow::Result<()> {
    let json = serde_json::to_string(&ServerFrame::error("expected hello"))?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(value["type"], "error");
    assert_eq!(value["message"], "expected hello");
    Ok(())
}
