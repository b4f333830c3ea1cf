//! Trigger file parsing
//!
//! One rule per line: `EVENT[+MODIFIER...] VALUE COMMAND...`, e.g.
//!
//! ```text
//! # volume keys
//! KEY_VOLUMEUP          1   amixer set Master 5%+
//! KEY_LEFTCTRL+KEY_F1   1   /usr/local/bin/lock-screen
//! SW_LID                0   /usr/local/bin/resume
//! ```
//!
//! `#` at the start of a line or after whitespace starts a comment.
//! Malformed lines are skipped with a warning.

use anyhow::{Context, Result, anyhow, bail};
use std::path::Path;
use tracing::{info, warn};

use super::keystate::KeyState;
use crate::constants::triggers;
use crate::input::event::{EventClass, KeyEvent};
use crate::input::names;

/// A rule binding one event (plus held modifiers) to a shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub class: EventClass,
    pub code: u16,
    pub value: i32,
    pub modifiers: Vec<(EventClass, u16)>,
    pub command: String,
}

impl Trigger {
    /// Same event, and every modifier currently held
    pub fn matches(&self, event: &KeyEvent, state: &KeyState) -> bool {
        self.class == event.class
            && self.code == event.code
            && self.value == event.value
            && self
                .modifiers
                .iter()
                .all(|&(class, code)| state.is_held(class, code))
    }
}

/// Cut a trailing comment. `#` only opens one at the start of the line or
/// after whitespace, so commands like `curl http://host/#x` survive.
fn strip_comment(line: &str) -> &str {
    let mut previous = None;
    for (index, c) in line.char_indices() {
        if c == triggers::COMMENT && previous.is_none_or(char::is_whitespace) {
            return &line[..index];
        }
        previous = Some(c);
    }
    line
}

/// Parse one trigger line. Blank and comment lines yield `None`.
pub fn parse_trigger_line(line: &str) -> Result<Option<Trigger>> {
    let line = strip_comment(line).trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (event_spec, rest) = split_token(line);
    let (value, rest) = split_token(rest);
    let command = rest.trim();

    if value.is_empty() {
        bail!("Missing event value");
    }
    if command.is_empty() {
        bail!("Missing command");
    }

    let value: i32 = value
        .parse()
        .with_context(|| format!("Invalid event value '{}'", value))?;

    let mut names_iter = event_spec.split(triggers::MODIFIER_SEPARATOR);
    let event_name = names_iter.next().unwrap_or_default();
    let (class, code) = resolve(event_name)?;
    let modifiers = names_iter.map(resolve).collect::<Result<Vec<_>>>()?;

    Ok(Some(Trigger {
        class,
        code,
        value,
        modifiers,
        command: command.to_string(),
    }))
}

/// Load every valid rule from a trigger file
pub fn load_trigger_file(path: &Path) -> Result<Vec<Trigger>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Unable to read trigger file '{}'", path.display()))?;

    let mut loaded = Vec::new();
    for (index, line) in content.lines().enumerate() {
        match parse_trigger_line(line) {
            Ok(Some(trigger)) => loaded.push(trigger),
            Ok(None) => {}
            Err(e) => warn!(
                file = %path.display(),
                line = index + 1,
                error = %format!("{:#}", e),
                "Skipping invalid trigger"
            ),
        }
    }

    info!(file = %path.display(), count = loaded.len(), "Loaded triggers");
    Ok(loaded)
}

fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], &s[end..]),
        None => (s, ""),
    }
}

fn resolve(name: &str) -> Result<(EventClass, u16)> {
    names::parse_event_name(name).ok_or_else(|| anyhow!("Unknown event name '{}'", name))
}
