//! Raw input event records
//!
//! Devices are read one kernel `struct input_event` at a time. Only the
//! trailing `type`/`code`/`value` fields matter here; the leading `timeval`
//! differs in size between 32 and 64 bit targets, so fields are located
//! relative to the end of the record.

use crate::constants::input;

/// Size of one kernel event record on this target
pub const EVENT_SIZE: usize = std::mem::size_of::<libc::input_event>();

/// `u16 type` + `u16 code` + `i32 value`
const PAYLOAD_SIZE: usize = 8;

/// One decoded event record, of any type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRecord {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl InputRecord {
    /// Decode a full record as read from an evdev node (native endian)
    pub fn decode(raw: &[u8; EVENT_SIZE]) -> Self {
        let payload = &raw[EVENT_SIZE - PAYLOAD_SIZE..];
        Self {
            event_type: u16::from_ne_bytes([payload[0], payload[1]]),
            code: u16::from_ne_bytes([payload[2], payload[3]]),
            value: i32::from_ne_bytes([payload[4], payload[5], payload[6], payload[7]]),
        }
    }

    /// Narrow to a key or switch event; every other type is of no interest
    pub fn key_event(&self) -> Option<KeyEvent> {
        let class = EventClass::from_type(self.event_type)?;
        Some(KeyEvent {
            class,
            code: self.code,
            value: self.value,
        })
    }
}

/// Event classes forwarded to key-state tracking and triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventClass {
    Key,
    Switch,
}

impl EventClass {
    pub fn from_type(event_type: u16) -> Option<Self> {
        match event_type {
            input::EV_KEY => Some(Self::Key),
            input::EV_SW => Some(Self::Switch),
            _ => None,
        }
    }
}

/// A key or switch event: the tuple handed to the key-state tracker and trigger engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub class: EventClass,
    pub code: u16,
    pub value: i32,
}

impl KeyEvent {
    pub fn new(class: EventClass, code: u16, value: i32) -> Self {
        Self { class, code, value }
    }

    pub fn is_release(&self) -> bool {
        self.value == input::KEY_RELEASE
    }
}

/// Encode a record the way the kernel lays it out, zero timestamp.
/// Used to build fake device files in tests.
#[cfg(test)]
pub fn encode(event_type: u16, code: u16, value: i32) -> [u8; EVENT_SIZE] {
    let mut raw = [0u8; EVENT_SIZE];
    let payload = &mut raw[EVENT_SIZE - PAYLOAD_SIZE..];
    payload[0..2].copy_from_slice(&event_type.to_ne_bytes());
    payload[2..4].copy_from_slice(&code.to_ne_bytes());
    payload[4..8].copy_from_slice(&value.to_ne_bytes());
    raw
}
