// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use std::path::Path;

fn info(tty: &str) -> PaneInfo {
    PaneInfo { tty: PathBuf::from(tty), cols: 80, rows: 24 }
}

#[test]
fn absent_to_present_emits_path_changed() {
    let event = classify(None, Some(&info("/dev/pts/3")));
    assert_eq!(
        event,
        Some(PaneEvent::Present {
            path: PathBuf::from("/dev/pts/3"),
            cols: 80,
            rows: 24,
            path_changed: true,
        })
    );
}

#[test]
fn stable_path_emits_nothing() {
    let event = classify(Some(Path::new("/dev/pts/3")), Some(&info("/dev/pts/3")));
    assert_eq!(event, None);
}

#[test]
fn path_change_emits_path_changed() {
    let event = classify(Some(Path::new("/dev/pts/3")), Some(&info("/dev/pts/9")));
    match event {
        Some(PaneEvent::Present { path, path_changed, .. }) => {
            assert_eq!(path, PathBuf::from("/dev/pts/9"));
            assert!(path_changed);
        }
        other => assert!(false, "unexpected event: {other:?}"),
    }
}

#[test]
fn present_to_absent_emits_absent() {
    assert_eq!(classify(Some(Path::new("/dev/pts/3")), None), Some(PaneEvent::Absent));
}

#[test]
fn absent_stays_silent() {
    assert_eq!(classify(None, None), None);
}

#[tokio::test]
async fn monitor_against_dead_server_emits_nothing() -> anyhow::Result<()> {
    // Isolated socket path with no tmux server behind it: every poll
    // resolves to absent, so a fresh monitor never emits.
    let dir = tempfile::tempdir()?;
    let tmux = Tmux::new(Some(dir.path().join("no-server.sock")));
    let cancel = CancellationToken::new();
    let monitor = PaneMonitor::new(tmux, "ghost:0.0".to_owned(), Duration::from_millis(10));
    let (mut rx, handle) = monitor.spawn(cancel.clone());

    handle.force_check();
    let got = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(got.is_err(), "expected no event, got {got:?}");

    cancel.cancel();
    Ok(())
}
