//! Application-wide constants
//!
//! Magic numbers shared between the event loop, the control channel and the
//! trigger engine.

/// Input event constants (from Linux input-event-codes.h)
pub mod input {
    /// Event type for keys and buttons
    pub const EV_KEY: u16 = 0x01;

    /// Event type for binary switches (lid, headphone jack, ...)
    pub const EV_SW: u16 = 0x05;

    /// Key release event value
    pub const KEY_RELEASE: i32 = 0;
}

/// Control channel constants
pub mod control {
    /// Capacity of the command reassembly buffer, in bytes.
    /// A single command line can hold at most `BUFFER_CAPACITY - 2` bytes plus its newline.
    pub const BUFFER_CAPACITY: usize = 1024;

    /// Operation adding a device
    pub const OP_ADD: &str = "ADD";

    /// Operation removing a device
    pub const OP_REMOVE: &str = "REMOVE";
}

/// Event loop constants
pub mod daemon {
    /// Readiness wait timeout; only bounds how often the loop re-checks its exit condition
    pub const POLL_TIMEOUT_MS: u16 = 5000;
}

/// Trigger file constants
pub mod triggers {
    /// Shell used to run trigger commands
    pub const SHELL: &str = "/bin/sh";

    /// Starts a comment in trigger files
    pub const COMMENT: char = '#';

    /// Joins an event name with its modifiers, e.g. `KEY_LEFTCTRL+KEY_F1`
    pub const MODIFIER_SEPARATOR: char = '+';
}
