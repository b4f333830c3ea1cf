//! Control commands and their effect on the device registry
//!
//! Wire format: one command per line, `OPERATION ARGUMENT`, separated by
//! whitespace. Extra tokens are ignored. Unknown operations and missing
//! arguments are dropped without a reply; the channel is write-only for clients.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::constants::control;
use crate::input::registry::DeviceRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start watching a device (replacing any handle already open for it)
    Add(PathBuf),
    /// Stop watching a device
    Remove(PathBuf),
}

impl Command {
    /// Parse one command line (without its newline).
    /// The argument is taken byte for byte, so any path the kernel accepts works.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let mut tokens = line
            .split(|b| b.is_ascii_whitespace())
            .filter(|token| !token.is_empty());
        let operation = tokens.next()?;
        let argument = PathBuf::from(OsStr::from_bytes(tokens.next()?));

        if operation == control::OP_ADD.as_bytes() {
            Some(Self::Add(argument))
        } else if operation == control::OP_REMOVE.as_bytes() {
            Some(Self::Remove(argument))
        } else {
            None
        }
    }

    pub fn apply(self, registry: &mut DeviceRegistry) {
        match self {
            Self::Add(path) => {
                info!(path = %path.display(), "Adding device");
                registry.add(&path);
            }
            Self::Remove(path) => {
                info!(path = %path.display(), "Removing device");
                registry.remove(&path);
            }
        }
    }
}

/// Parse `line` and apply it to the registry; anything unparseable is ignored
pub fn interpret(line: &[u8], registry: &mut DeviceRegistry) {
    match Command::parse(line) {
        Some(command) => command.apply(registry),
        None if line.trim_ascii().is_empty() => {}
        None => {
            let line = String::from_utf8_lossy(line);
            debug!(line = %line, "Ignoring unrecognized command");
        }
    }
}
