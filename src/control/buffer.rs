//! Reassembly of newline-terminated commands from arbitrary reads
//!
//! The buffer never holds more than `capacity - 1` bytes. A line that would
//! not fit is rejected: the pending bytes are dropped and everything up to
//! and including the next newline is skipped, so the tail of an overlong
//! line is never mistaken for a command of its own.

use tracing::warn;

#[derive(Debug)]
pub struct LineBuffer {
    data: Vec<u8>,
    capacity: usize,
    /// Set after an overflow until the next newline resynchronizes the stream
    discarding: bool,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            discarding: false,
        }
    }

    /// Bytes that can be appended before the buffer is full
    pub fn remaining(&self) -> usize {
        self.capacity - 1 - self.data.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop any partial line; used when the writer goes away
    pub fn clear(&mut self) {
        self.data.clear();
        self.discarding = false;
    }

    /// Append freshly read bytes and return every line they complete, in
    /// order, without their newline. A trailing partial line stays buffered.
    /// Lines are raw bytes: device paths need not be valid UTF-8.
    pub fn append(&mut self, mut bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();

        while !bytes.is_empty() {
            if self.discarding {
                match bytes.iter().position(|&b| b == b'\n') {
                    Some(newline) => {
                        self.discarding = false;
                        bytes = &bytes[newline + 1..];
                        continue;
                    }
                    None => break,
                }
            }

            let take = bytes.len().min(self.remaining());
            self.data.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];

            while let Some(line) = self.next_line() {
                lines.push(line);
            }

            if self.remaining() == 0 {
                self.reject_overflow();
            }
        }

        lines
    }

    /// Remove and return the first complete line, if any
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let newline = self.data.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.data.drain(..=newline).collect();
        line.pop();
        Some(line)
    }

    fn reject_overflow(&mut self) {
        warn!(
            capacity = self.capacity,
            "Command too long, discarding it up to the next newline"
        );
        self.data.clear();
        self.discarding = true;
    }
}
