//! A single open input device

use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::Read;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};

use super::event::{EVENT_SIZE, InputRecord};

/// An open event source, identified by the path it was opened from.
/// Closing happens on drop.
#[derive(Debug)]
pub struct Device {
    path: PathBuf,
    file: File,
}

impl Device {
    /// Open a device node (or any readable file carrying event records)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Unable to open device '{}'", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read exactly one event record.
    /// Only called after the descriptor was reported readable, so it never blocks.
    /// Anything short of a full record (EOF included) is an error: the device is gone.
    pub fn read_event(&mut self) -> Result<InputRecord> {
        let mut raw = [0u8; EVENT_SIZE];
        let read = self
            .file
            .read(&mut raw)
            .with_context(|| format!("Error reading device '{}'", self.path.display()))?;
        if read != EVENT_SIZE {
            bail!(
                "Short read on device '{}': {} of {} bytes",
                self.path.display(),
                read,
                EVENT_SIZE
            );
        }
        Ok(InputRecord::decode(&raw))
    }
}

impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}
