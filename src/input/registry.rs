//! Registry of open input devices
//!
//! Owns every open device. Insertion order is the order devices are drained
//! in each loop iteration. At most one entry exists per path.

use anyhow::Result;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::device::Device;

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any entry for `path` with a freshly opened handle at the end.
    /// The old entry is removed before opening, so a path that can no longer
    /// be opened ends up unregistered. Returns whether the device is now registered.
    pub fn add(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.remove(path);
        match Device::open(path) {
            Ok(device) => {
                self.devices.push(device);
                info!(path = %path.display(), count = self.devices.len(), "Device added");
                true
            }
            Err(e) => {
                error!(path = %path.display(), error = %format!("{:#}", e), "Unable to add device");
                false
            }
        }
    }

    /// Close and unlink the device opened from `path`. Absent paths are a no-op.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let before = self.devices.len();
        self.devices.retain(|device| device.path() != path);
        let removed = self.devices.len() != before;
        if removed {
            info!(path = %path.display(), count = self.devices.len(), "Device removed");
        } else {
            debug!(path = %path.display(), "Device not registered, nothing to remove");
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.devices.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.devices.iter().map(Device::path)
    }

    /// Descriptors in registry order, for building the readiness set
    pub fn fds(&self) -> impl Iterator<Item = BorrowedFd<'_>> {
        self.devices.iter().map(|device| device.as_fd())
    }

    /// Visit every device whose slot in `ready` is set, in registry order.
    ///
    /// `ready` is indexed like [`fds`](Self::fds) at the time the readiness
    /// set was built. A device whose visit fails is removed at once and the
    /// pass carries on with the remaining ready devices.
    pub fn for_each_ready<F>(&mut self, ready: &[bool], mut visit: F)
    where
        F: FnMut(&mut Device) -> Result<()>,
    {
        let mut index = 0;
        self.devices.retain_mut(|device| {
            let is_ready = ready.get(index).copied().unwrap_or(false);
            index += 1;
            if !is_ready {
                return true;
            }
            match visit(device) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        path = %device.path().display(),
                        error = %format!("{:#}", e),
                        "Removing device after read failure"
                    );
                    false
                }
            }
        });
    }
}
