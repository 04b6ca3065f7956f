// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! All tmux shell-outs used by the streaming core.
//!
//! tmux owns the panes; porthole never touches a PTY master directly.
//! Output is duplicated with `pipe-pane`, input goes through
//! `send-keys -l`, and pane metadata comes from `display-message -p`
//! format queries.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// A handle to one tmux server, optionally addressed via `-S <socket>`.
///
/// Cloneable and cheap; every method shells out a fresh `tmux` process.
#[derive(Debug, Clone, Default)]
pub struct Tmux {
    socket: Option<PathBuf>,
}

/// Resolved pane metadata from a `display-message` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    /// The pseudo-terminal device currently backing the pane.
    pub tty: PathBuf,
    pub cols: u16,
    pub rows: u16,
}

/// One pane row from `list-panes -a`, used by the pane switcher endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneListing {
    pub session: String,
    pub window_index: u32,
    pub window_name: String,
    pub pane_index: u32,
    /// Foreground command running in the pane.
    pub command: String,
    pub active: bool,
}

impl PaneListing {
    /// The pane identifier in `session:window.pane` form.
    pub fn target(&self) -> String {
        format!("{}:{}.{}", self.session, self.window_index, self.pane_index)
    }
}

impl Tmux {
    /// Create a handle for the default tmux server, or an isolated one
    /// when `socket` is set.
    pub fn new(socket: Option<PathBuf>) -> Self {
        Self { socket }
    }

    /// Build a `tokio::process::Command` for tmux, prepending `-S <socket>`.
    fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("tmux");
        if let Some(ref s) = self.socket {
            cmd.arg("-S").arg(s);
        }
        cmd
    }

    /// Whether the named tmux session exists.
    pub async fn has_session(&self, name: &str) -> bool {
        self.command()
            .args(["has-session", "-t", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Resolve a pane's device path and dimensions.
    ///
    /// Returns `None` when the pane does not exist or tmux itself is
    /// unreachable — callers treat both as pane-absent and keep polling.
    pub async fn pane_info(&self, target: &str) -> Option<PaneInfo> {
        let output = self
            .command()
            .args([
                "display-message",
                "-p",
                "-t",
                target,
                "#{pane_tty}\t#{pane_width}\t#{pane_height}",
            ])
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        parse_pane_info(&String::from_utf8_lossy(&output.stdout))
    }

    /// Current cursor position of the pane, 0-based `(col, row)`.
    pub async fn cursor(&self, target: &str) -> Option<(u16, u16)> {
        let output = self
            .command()
            .args(["display-message", "-p", "-t", target, "#{cursor_x}\t#{cursor_y}"])
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        parse_cursor(&String::from_utf8_lossy(&output.stdout))
    }

    /// Start duplicating the pane's output into the FIFO at `pipe`.
    pub async fn pipe_open(&self, target: &str, pipe: &Path) -> anyhow::Result<()> {
        let shell_cmd = format!("cat > '{}'", pipe.display());
        let status = self
            .command()
            .args(["pipe-pane", "-t", target, "-o", &shell_cmd])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("tmux pipe-pane failed for {target}");
        }
        Ok(())
    }

    /// Stop duplicating the pane's output.
    pub async fn pipe_close(&self, target: &str) -> anyhow::Result<()> {
        let status = self
            .command()
            .args(["pipe-pane", "-t", target])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("tmux pipe-pane (stop) failed for {target}");
        }
        Ok(())
    }

    /// Rendered snapshot of the visible pane plus `scrollback` lines of
    /// history, with escape sequences preserved.
    pub async fn capture_rendered(&self, target: &str, scrollback: u32) -> anyhow::Result<Vec<u8>> {
        let from = format!("-{scrollback}");
        let output = self
            .command()
            .args(["capture-pane", "-p", "-e", "-t", target, "-S", &from])
            .stderr(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            anyhow::bail!("tmux capture-pane failed for {target}");
        }
        Ok(output.stdout)
    }

    /// Inject raw bytes into the pane as if typed, via the literal-send
    /// command. Byte order within one call is preserved.
    pub async fn send_literal(&self, target: &str, data: &[u8]) -> anyhow::Result<()> {
        let status = self
            .command()
            .args(["send-keys", "-l", "-t", target, "--"])
            .arg(OsStr::from_bytes(data))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("tmux send-keys failed for {target}");
        }
        Ok(())
    }

    /// All panes visible to the server, in listing order.
    ///
    /// Failure (including tmux not running) yields an empty list — the
    /// switcher endpoint treats "no server" and "no panes" the same.
    pub async fn list_panes(&self) -> Vec<PaneListing> {
        let output = self
            .command()
            .args([
                "list-panes",
                "-a",
                "-F",
                "#{session_name}\t#{window_index}\t#{window_name}\t#{pane_index}\t#{pane_current_command}\t#{pane_active}",
            ])
            .stderr(Stdio::null())
            .output()
            .await;
        match output {
            Ok(out) if out.status.success() => {
                parse_pane_listings(&String::from_utf8_lossy(&out.stdout))
            }
            _ => Vec::new(),
        }
    }
}

/// Parse one `pane_tty\tpane_width\tpane_height` line.
fn parse_pane_info(line: &str) -> Option<PaneInfo> {
    let mut fields = line.trim().split('\t');
    let tty = PathBuf::from(fields.next()?);
    let cols = fields.next()?.parse().ok()?;
    let rows = fields.next()?.parse().ok()?;
    Some(PaneInfo { tty, cols, rows })
}

/// Parse one `cursor_x\tcursor_y` line.
fn parse_cursor(line: &str) -> Option<(u16, u16)> {
    let mut fields = line.trim().split('\t');
    let x = fields.next()?.parse().ok()?;
    let y = fields.next()?.parse().ok()?;
    Some((x, y))
}

/// Parse `list-panes -a` output; malformed lines are skipped.
fn parse_pane_listings(text: &str) -> Vec<PaneListing> {
    text.lines().filter_map(parse_pane_listing).collect()
}

fn parse_pane_listing(line: &str) -> Option<PaneListing> {
    let mut fields = line.split('\t');
    let session = fields.next()?.to_owned();
    let window_index = fields.next()?.parse().ok()?;
    let window_name = fields.next()?.to_owned();
    let pane_index = fields.next()?.parse().ok()?;
    let command = fields.next()?.to_owned();
    let active = fields.next()? == "1";
    Some(PaneListing { session, window_index, window_name, pane_index, command, active })
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
