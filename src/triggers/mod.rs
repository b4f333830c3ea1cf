//! Triggers: key-state tracking, trigger files and command launch

pub mod config;
pub mod engine;
pub mod keystate;

pub use engine::{ShellLauncher, TriggerEngine};
