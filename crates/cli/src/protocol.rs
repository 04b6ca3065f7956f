// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket wire frames.
//!
//! JSON text frames, internally tagged (`{"type": "output", ...}`), in
//! both directions. Output bytes travel base64-encoded.

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

/// Replay variant requested in the hello frame. Anything other than
/// `"full"` is treated as tail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    Full,
    #[default]
    Tail,
}

impl<'de> Deserialize<'de> for ReplayMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mode = String::deserialize(deserializer)?;
        Ok(if mode == "full" { ReplayMode::Full } else { ReplayMode::Tail })
    }
}

/// Frames sent by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Required first frame on every connection.
    #[serde(rename_all = "camelCase")]
    Hello {
        #[serde(default)]
        replay_mode: ReplayMode,
        #[serde(default)]
        tail_size: Option<usize>,
    },
    /// Raw bytes to inject into the pane, base64-encoded.
    Input { data: String },
    /// Accepted and discarded — pane dimensions are authoritative.
    Resize { cols: u16, rows: u16 },
}

/// Pane lifecycle state carried in status frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaneState {
    Connected,
    Missing,
}

/// Frames sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// A chunk of pane output, base64-encoded.
    Output { data: String },
    #[serde(rename_all = "camelCase")]
    Status { pane_state: PaneState, epoch: u64, cols: u16, rows: u16 },
    /// Terminal error; the channel is closed after sending.
    Error { message: String },
}

impl ServerFrame {
    /// Build an output frame from raw pane bytes.
    pub fn output(data: &[u8]) -> Self {
        Self::Output { data: base64::engine::general_purpose::STANDARD.encode(data) }
    }

    pub fn status(pane_state: PaneState, epoch: u64, cols: u16, rows: u16) -> Self {
        Self::Status { pane_state, epoch, cols, rows }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }
}

/// Decode the payload of an input frame.
pub fn decode_input(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(data)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
