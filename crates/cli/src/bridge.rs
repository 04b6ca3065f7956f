// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridges one tmux pane to the in-memory stream.
//!
//! Output capture never reads the pane's PTY master — that would race the
//! multiplexer's own reader. Instead tmux is told to duplicate the pane's
//! output into a private FIFO (`pipe-pane`), which a dedicated task reads
//! in 32 KiB chunks. Input goes the other way through `send-keys -l`, so
//! injected bytes are indistinguishable from a user typing into tmux.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::stat::Mode;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::tmux::Tmux;

/// Capture read chunk size.
const CAPTURE_CHUNK: usize = 32 * 1024;

/// Depth of the input injection channel. Callers enqueue non-blocking and
/// drop with a log when full.
const INPUT_CHANNEL_CAPACITY: usize = 64;

const RESIZE_CHANNEL_CAPACITY: usize = 8;

/// Callback invoked on the capture reader task for every chunk of pane
/// output. Must not block.
pub type OutputFn = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Newtype for the FIFO file descriptor, for use with [`AsyncFd`].
struct PipeFd(OwnedFd);

impl AsRawFd for PipeFd {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.0.as_raw_fd()
    }
}

impl AsFd for PipeFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

/// Set the given file descriptor to non-blocking mode.
fn set_nonblocking(fd: &impl AsFd) -> std::io::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(io_err)?;
    let flags = OFlag::from_bits_truncate(flags);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK)).map_err(io_err)?;
    Ok(())
}

fn io_err(e: nix::errno::Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(e as i32)
}

/// A FIFO rendezvous point for `pipe-pane` output, owner-only permissions.
///
/// Opened `O_RDWR | O_NONBLOCK`: holding the write side ourselves means a
/// pipe-pane restart can never produce spurious EOF, and non-blocking
/// reads through [`AsyncFd`] stay cancellable. The backing temp directory
/// (and thus the FIFO) is removed on drop.
struct CapturePipe {
    _dir: tempfile::TempDir,
    path: PathBuf,
    fd: AsyncFd<PipeFd>,
}

impl CapturePipe {
    fn create() -> anyhow::Result<Self> {
        let dir = tempfile::Builder::new().prefix("porthole-").tempdir()?;
        let path = dir.path().join(format!("{}.pipe", uuid::Uuid::new_v4()));
        nix::unistd::mkfifo(&path, Mode::from_bits_truncate(0o600))?;
        let file = std::fs::OpenOptions::new().read(true).write(true).open(&path)?;
        set_nonblocking(&file)?;
        let fd = AsyncFd::new(PipeFd(file.into()))?;
        Ok(Self { _dir: dir, path, fd })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Read one chunk from the FIFO, waiting for readability.
    async fn read_chunk(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| nix::unistd::read(inner.get_ref(), buf).map_err(io_err)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }
}

/// One live attachment to a pane device: the capture reader plus its
/// cancellation scope. The reader owns the FIFO.
struct Attachment {
    device: PathBuf,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

/// The I/O bridge for one pane: capture reader in, input writer out.
///
/// The input writer and resize drainer live for the whole session; the
/// capture side is torn down and rebuilt on every attach (each successful
/// attach bumps the epoch).
pub struct PaneBridge {
    tmux: Tmux,
    target: String,
    epoch: AtomicU64,
    input_tx: mpsc::Sender<Bytes>,
    resize_tx: mpsc::Sender<(u16, u16)>,
    on_output: OutputFn,
    attachment: tokio::sync::Mutex<Option<Attachment>>,
}

impl PaneBridge {
    /// Build the bridge and start its input writer and resize drainer,
    /// both bound to the session's `cancel` token.
    pub fn new(
        tmux: Tmux,
        target: String,
        on_output: OutputFn,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let (resize_tx, resize_rx) = mpsc::channel(RESIZE_CHANNEL_CAPACITY);

        tokio::spawn(input_writer(tmux.clone(), target.clone(), input_rx, cancel.clone()));
        tokio::spawn(resize_drain(resize_rx, cancel));

        Arc::new(Self {
            tmux,
            target,
            epoch: AtomicU64::new(0),
            input_tx,
            resize_tx,
            on_output,
            attachment: tokio::sync::Mutex::new(None),
        })
    }

    /// Number of successful attaches so far; 0 means never attached.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Attach to a pane device. Fails if already attached.
    pub async fn attach(&self, device: &Path) -> anyhow::Result<()> {
        let mut slot = self.attachment.lock().await;
        anyhow::ensure!(slot.is_none(), "bridge already attached");
        self.attach_locked(&mut slot, device).await
    }

    /// Detach (if attached) and attach to a new device.
    pub async fn reattach(&self, device: &Path) -> anyhow::Result<()> {
        let mut slot = self.attachment.lock().await;
        if let Some(att) = slot.take() {
            self.teardown(att).await;
        }
        self.attach_locked(&mut slot, device).await
    }

    /// Stop capturing and release the FIFO. Idempotent.
    pub async fn detach(&self) {
        let mut slot = self.attachment.lock().await;
        if let Some(att) = slot.take() {
            self.teardown(att).await;
        }
    }

    async fn attach_locked(
        &self,
        slot: &mut Option<Attachment>,
        device: &Path,
    ) -> anyhow::Result<()> {
        let pipe = CapturePipe::create()?;
        self.tmux.pipe_open(&self.target, pipe.path()).await?;

        // Publish the new epoch before the reader starts so status frames
        // carrying it can never precede the output they describe.
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;

        let cancel = CancellationToken::new();
        let reader = tokio::spawn(capture_reader(pipe, cancel.clone(), Arc::clone(&self.on_output)));
        debug!(pane = %self.target, device = %device.display(), epoch, "bridge attached");

        *slot = Some(Attachment { device: device.to_path_buf(), cancel, reader });
        Ok(())
    }

    async fn teardown(&self, att: Attachment) {
        att.cancel.cancel();
        if let Err(e) = self.tmux.pipe_close(&self.target).await {
            debug!(pane = %self.target, "pipe-pane stop failed: {e:#}");
        }
        if let Err(e) = att.reader.await {
            debug!(pane = %self.target, "capture reader join error: {e}");
        }
        debug!(pane = %self.target, device = %att.device.display(), "bridge detached");
    }

    /// Enqueue raw bytes for injection into the pane. Non-blocking; a full
    /// queue drops the message with a warning.
    pub fn queue_input(&self, data: Bytes) {
        match self.input_tx.try_send(data) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(pane = %self.target, "input queue full, dropping");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(pane = %self.target, "input writer gone, dropping input");
            }
        }
    }

    /// Record a client resize request. Accepted but never applied — the
    /// pane's dimensions are authoritative and clients adapt.
    pub fn queue_resize(&self, cols: u16, rows: u16) {
        let _ = self.resize_tx.try_send((cols, rows));
    }
}

/// Reads capture chunks off the FIFO and hands them to the output callback.
async fn capture_reader(pipe: CapturePipe, cancel: CancellationToken, on_output: OutputFn) {
    let mut buf = vec![0u8; CAPTURE_CHUNK];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = pipe.read_chunk(&mut buf) => match result {
                Ok(0) => {
                    debug!("capture pipe EOF");
                    break;
                }
                Ok(n) => on_output(&buf[..n]),
                Err(e) => {
                    if !cancel.is_cancelled() {
                        // The monitor will flag the pane absent and a new
                        // attach will start a fresh reader.
                        error!("capture pipe read error: {e}");
                    }
                    break;
                }
            }
        }
    }
}

/// Drains the input channel into `send-keys -l`. One writer per bridge, so
/// bytes from a single message never interleave with another's.
async fn input_writer(
    tmux: Tmux,
    target: String,
    mut rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) {
    loop {
        let data = tokio::select! {
            _ = cancel.cancelled() => break,
            data = rx.recv() => match data {
                Some(data) => data,
                None => break,
            },
        };
        if let Err(e) = tmux.send_literal(&target, &data).await {
            // Transient tmux errors must not tear the bridge down.
            warn!(pane = %target, "input inject failed: {e:#}");
        }
    }
}

/// Accepts and discards resize requests.
async fn resize_drain(mut rx: mpsc::Receiver<(u16, u16)>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            resize = rx.recv() => match resize {
                Some((cols, rows)) => {
                    debug!(cols, rows, "client resize ignored, pane dimensions are authoritative");
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
