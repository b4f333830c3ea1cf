//! Control channel: a named, reopenable stream of text commands
//!
//! Usually a FIFO. When the last writer disconnects the read end reports
//! EOF forever, so the channel is closed and reopened at once. A failed
//! open retires the channel for the rest of the run.

use anyhow::{Context, Result, anyhow};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::buffer::LineBuffer;

#[derive(Debug)]
enum ChannelState {
    /// No path configured; the channel plays no role
    Unconfigured,
    /// Path known, no handle (before the first open, or between disconnect and reopen)
    Closed,
    Open(File),
    /// Opening failed; never retried
    Absent,
}

#[derive(Debug)]
pub struct ControlChannel {
    path: Option<PathBuf>,
    state: ChannelState,
    buffer: LineBuffer,
}

impl ControlChannel {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            path: None,
            state: ChannelState::Unconfigured,
            buffer: LineBuffer::new(buffer_capacity),
        }
    }

    /// Record the channel path without opening it
    pub fn configure(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
        self.state = ChannelState::Closed;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Open the configured path read-only and non-blocking.
    /// Any previous handle is closed first. On failure the path is dropped for good.
    pub fn open(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| anyhow!("No command channel configured"))?;

        self.state = ChannelState::Closed;

        match OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
        {
            Ok(file) => {
                debug!(path = %path.display(), "Command channel opened");
                self.state = ChannelState::Open(file);
                Ok(())
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Unable to open command channel");
                self.path = None;
                self.state = ChannelState::Absent;
                Err(e).with_context(|| format!("Unable to open command channel '{}'", path.display()))
            }
        }
    }

    /// True while the channel holds an open handle
    pub fn readable(&self) -> bool {
        matches!(self.state, ChannelState::Open(_))
    }

    /// Handle to include in the readiness set, if open
    pub fn fd(&self) -> Option<BorrowedFd<'_>> {
        match &self.state {
            ChannelState::Open(file) => Some(file.as_fd()),
            _ => None,
        }
    }

    /// Bytes of a partial command currently held back
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Read what is available and return the complete command lines it yields.
    ///
    /// Never asks for more bytes than the reassembly buffer has room for.
    /// EOF means the writer disconnected: the partial command is dropped and
    /// the channel is reopened once.
    pub fn consume(&mut self) -> Vec<Vec<u8>> {
        let ChannelState::Open(file) = &mut self.state else {
            return Vec::new();
        };

        let mut chunk = vec![0u8; self.buffer.remaining()];
        match file.read(&mut chunk) {
            Ok(0) => {
                info!("Command channel writer disconnected, reopening");
                self.reopen();
                Vec::new()
            }
            Ok(read) => self.buffer.append(&chunk[..read]),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Error reading command channel, reopening");
                self.reopen();
                Vec::new()
            }
        }
    }

    fn reopen(&mut self) {
        if !self.buffer.is_empty() {
            warn!(bytes = self.pending(), "Dropping partial command");
        }
        self.buffer.clear();
        self.state = ChannelState::Closed;
        // failure is logged by open() and leaves the channel absent
        let _ = self.open();
    }
}
