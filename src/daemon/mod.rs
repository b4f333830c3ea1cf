//! Event daemon - multiplexes input devices and the control channel

mod dispatcher;
mod main_loop;
mod signals;

pub use dispatcher::EventHandler;
pub use main_loop::{DaemonOptions, run_daemon};
