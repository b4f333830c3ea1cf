//! Tracks which keys and switches are currently held

use std::collections::BTreeSet;

use crate::input::event::{EventClass, KeyEvent};
use crate::input::names;

#[derive(Debug, Default)]
pub struct KeyState {
    held: BTreeSet<(EventClass, u16)>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Press and repeat mark the key as held, release clears it
    pub fn update(&mut self, event: &KeyEvent) {
        if event.is_release() {
            self.held.remove(&(event.class, event.code));
        } else {
            self.held.insert((event.class, event.code));
        }
    }

    pub fn is_held(&self, class: EventClass, code: u16) -> bool {
        self.held.contains(&(class, code))
    }

    /// Dump-mode snapshot: `# KEY_A+KEY_LEFTSHIFT`, keys in code order
    pub fn render(&self) -> String {
        let names: Vec<String> = self
            .held
            .iter()
            .map(|&(class, code)| {
                names::event_name(&KeyEvent::new(class, code, 1))
                    .unwrap_or_else(|| format!("{}:{}", names::type_name(class), code))
            })
            .collect();
        format!("# {}", names.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: u16, value: i32) -> KeyEvent {
        KeyEvent::new(EventClass::Key, code, value)
    }

    #[test]
    fn test_press_and_release() {
        let mut state = KeyState::new();
        state.update(&key(30, 1));
        assert!(state.is_held(EventClass::Key, 30));

        state.update(&key(30, 2));
        assert!(state.is_held(EventClass::Key, 30));

        state.update(&key(30, 0));
        assert!(!state.is_held(EventClass::Key, 30));
    }

    #[test]
    fn test_key_and_switch_codes_are_distinct() {
        let mut state = KeyState::new();
        state.update(&KeyEvent::new(EventClass::Switch, 0, 1));
        assert!(state.is_held(EventClass::Switch, 0));
        assert!(!state.is_held(EventClass::Key, 0));
    }

    #[test]
    fn test_render() {
        let mut state = KeyState::new();
        assert_eq!(state.render(), "# ");

        state.update(&key(42, 1)); // KEY_LEFTSHIFT
        state.update(&key(30, 1)); // KEY_A
        assert_eq!(state.render(), "# KEY_A+KEY_LEFTSHIFT");
    }
}
