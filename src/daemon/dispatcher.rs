//! Event processing for the daemon
//!
//! Routes decoded device records to the key-state tracker and trigger
//! engine, and echoes them to the dump output when enabled.

use std::io::Write;
use std::path::Path;
use tracing::{debug, trace};

use crate::input::event::{InputRecord, KeyEvent};
use crate::input::names;

/// Consumer of key and switch events
pub trait EventHandler {
    /// Record the press/release in the key-state tracker
    fn update_keystate(&mut self, event: &KeyEvent);

    /// Printable snapshot of the held keys
    fn keystate(&self) -> String;

    /// Run every trigger matching the event
    fn dispatch_triggers(&mut self, event: &KeyEvent);
}

pub struct Dispatcher<H> {
    handler: H,
    dump: Option<Box<dyn Write>>,
}

impl<H: EventHandler> Dispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            dump: None,
        }
    }

    /// Echo every forwarded event and the resulting key state to `out`
    pub fn with_dump(mut self, out: Box<dyn Write>) -> Self {
        self.dump = Some(out);
        self
    }

    /// Forward one record read from `device`.
    /// Only key and switch events get through; everything else is dropped here.
    pub fn dispatch(&mut self, device: &Path, record: &InputRecord) {
        let Some(event) = record.key_event() else {
            trace!(device = %device.display(), event_type = record.event_type, "Ignoring event");
            return;
        };

        self.handler.update_keystate(&event);
        if self.dump.is_some() {
            self.dump_event(device, &event);
        }
        self.handler.dispatch_triggers(&event);
    }

    fn dump_event(&mut self, device: &Path, event: &KeyEvent) {
        let line = format_event(device, event);
        let keystate = self.handler.keystate();
        let Some(out) = self.dump.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(out, "{}\n{}", line, keystate).and_then(|()| out.flush()) {
            debug!(error = %e, "Failed to write event dump");
        }
    }
}

/// `TYPE<TAB>NAME<TAB>VALUE<TAB>DEVICE`
pub fn format_event(device: &Path, event: &KeyEvent) -> String {
    let name = names::event_name(event).unwrap_or_else(|| "unknown".to_string());
    format!(
        "{}\t{}\t{}\t{}",
        names::type_name(event.class),
        name,
        event.value,
        device.display()
    )
}
