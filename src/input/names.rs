//! Event and type names for diagnostics and trigger files
//!
//! Uses evdev's code tables, so names match Linux input-event-codes.h
//! (e.g. "KEY_VOLUMEUP", "SW_LID").

use evdev::{KeyCode, SwitchCode};
use std::str::FromStr;

use super::event::{EventClass, KeyEvent};

/// Linux name of an event type ("EV_KEY", "EV_SW")
pub fn type_name(class: EventClass) -> &'static str {
    match class {
        EventClass::Key => "EV_KEY",
        EventClass::Switch => "EV_SW",
    }
}

/// Linux name of the key or switch an event refers to, if it has one
pub fn event_name(event: &KeyEvent) -> Option<String> {
    let name = match event.class {
        EventClass::Key => format!("{:?}", KeyCode(event.code)),
        EventClass::Switch => format!("{:?}", SwitchCode(event.code)),
    };

    // evdev prints a placeholder for codes without a name; only accept
    // names that resolve back to the same code
    match parse_event_name(&name) {
        Some(parsed) if parsed == (event.class, event.code) => Some(name),
        _ => None,
    }
}

/// Resolve a `KEY_*` / `BTN_*` / `SW_*` name to its event class and code
pub fn parse_event_name(name: &str) -> Option<(EventClass, u16)> {
    if let Ok(key_code) = KeyCode::from_str(name) {
        return Some((EventClass::Key, key_code.code()));
    }
    if let Ok(switch_code) = SwitchCode::from_str(name) {
        return Some((EventClass::Switch, switch_code.0));
    }
    None
}
