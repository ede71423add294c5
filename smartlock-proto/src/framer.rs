//! Reassembly of BLE write chunks into complete messages
//!
//! A characteristic write carries at most one ATT payload, so JSON objects and
//! PEM blocks arrive split across several writes. A message is complete once
//! the buffer holds a newline or a NUL byte, or its trimmed form ends with `}`.
//! There is no length prefix: a payload that happens to end a chunk with `}`
//! before its real end is cut short. Likewise a multi-line PEM block stops
//! at its first newline, so only the BEGIN line arrives; centrals must send
//! PEM envelopes on one line (spaces instead of newlines) ending in NUL.

use log::warn;

/// Default upper bound for a partial message
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 4096;

/// Connection-scoped receive buffer
#[derive(Debug)]
pub struct MessageFramer {
    buffer: Vec<u8>,
    max_len: usize,
}

impl Default for MessageFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageFramer {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_MESSAGE_BYTES)
    }

    pub fn with_limit(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_len,
        }
    }

    /// Append a chunk; returns the message it completes, if any
    ///
    /// The buffer is always empty after a message is returned.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<String> {
        self.buffer.extend_from_slice(chunk);

        if !self.is_terminated() {
            if self.buffer.len() > self.max_len {
                warn!(
                    "dropping {} buffered bytes without a terminator",
                    self.buffer.len()
                );
                self.buffer.clear();
            }
            return None;
        }

        let raw = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&raw).replace('\0', "");
        let message = text.trim();
        if message.is_empty() {
            None
        } else {
            Some(message.to_string())
        }
    }

    /// Drop any partial message
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes waiting for a terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn is_terminated(&self) -> bool {
        self.buffer.contains(&b'\n')
            || self.buffer.contains(&0)
            || self.buffer.trim_ascii_end().ends_with(b"}")
    }
}
