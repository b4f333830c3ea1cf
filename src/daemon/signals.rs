//! Process-level signal setup

use anyhow::{Context, Result};
use nix::sys::signal::{self, SigHandler, Signal};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Let the kernel reap trigger commands as they exit, so detached children
/// never linger as zombies
#[allow(unsafe_code)] // Required for nix::sys::signal::signal()
pub fn ignore_child_exits() -> Result<()> {
    // SAFETY: SIG_IGN installs no handler function, so there is no
    // async-signal-safety requirement to uphold.
    unsafe { signal::signal(Signal::SIGCHLD, SigHandler::SigIgn) }
        .context("Failed to ignore SIGCHLD")?;
    Ok(())
}

/// Flag raised by SIGINT/SIGTERM. The pending readiness wait is interrupted,
/// and the main loop exits once it sees the flag.
pub fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(&flag))
            .with_context(|| format!("Failed to register handler for signal {}", sig))?;
    }
    Ok(flag)
}
