//! Trigger engine: key-state tracking plus rule matching and command launch

use anyhow::Result;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

use super::config::{self, Trigger};
use super::keystate::KeyState;
use crate::constants::triggers;
use crate::daemon::EventHandler;
use crate::input::event::KeyEvent;

/// Runs the command of a matched trigger
pub trait Launcher {
    fn launch(&mut self, command: &str);
}

/// Spawns commands through the shell, detached: the child is never waited on.
/// Reaping is left to the kernel (SIGCHLD is ignored at startup).
#[derive(Debug, Default)]
pub struct ShellLauncher;

impl Launcher for ShellLauncher {
    fn launch(&mut self, command: &str) {
        let spawned = Command::new(triggers::SHELL)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => info!(command = %command, pid = child.id(), "Launched trigger command"),
            Err(e) => error!(command = %command, error = %e, "Failed to launch trigger command"),
        }
    }
}

pub struct TriggerEngine<L: Launcher = ShellLauncher> {
    keystate: KeyState,
    triggers: Vec<Trigger>,
    launcher: L,
}

impl<L: Launcher> TriggerEngine<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            keystate: KeyState::new(),
            triggers: Vec::new(),
            launcher,
        }
    }

    /// Add the rules of a trigger file to the active set
    pub fn load_trigger_file(&mut self, path: &Path) -> Result<usize> {
        let loaded = config::load_trigger_file(path)?;
        let count = loaded.len();
        for trigger in loaded {
            self.add_trigger(trigger);
        }
        Ok(count)
    }

    pub fn add_trigger(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }
}

impl<L: Launcher> EventHandler for TriggerEngine<L> {
    fn update_keystate(&mut self, event: &KeyEvent) {
        self.keystate.update(event);
    }

    fn keystate(&self) -> String {
        self.keystate.render()
    }

    fn dispatch_triggers(&mut self, event: &KeyEvent) {
        for trigger in &self.triggers {
            if trigger.matches(event, &self.keystate) {
                debug!(command = %trigger.command, code = event.code, value = event.value, "Trigger matched");
                self.launcher.launch(&trigger.command);
            }
        }
    }
}
