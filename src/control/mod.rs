//! Control channel: runtime ADD/REMOVE of devices over a line protocol

pub mod buffer;
pub mod channel;
pub mod command;
