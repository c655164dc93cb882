//! Bounded per-file content buffers.
//!
//! Every file slot owns exactly one buffer. Logical length always stays
//! strictly below [`CONTENT_CAPACITY`]; writes that would reach the
//! capacity fail before mutating anything.

use crate::error::{Error, Result};
use crate::limits::CONTENT_CAPACITY;

/// A bounded, growable byte buffer bound to a file slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentBuffer {
    bytes: Vec<u8>,
}

/// Outcome of a clamped read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Bytes actually read.
    pub data: Vec<u8>,
    /// True when the request asked for more bytes than remained and was
    /// clamped to end-of-content.
    pub clamped: bool,
}

impl ContentBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a buffer from raw bytes, e.g. a decoded snapshot image.
    ///
    /// Fails if `bytes` would not fit a live buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() >= CONTENT_CAPACITY {
            return Err(Error::CapacityExceeded {
                written: bytes.len(),
                capacity: CONTENT_CAPACITY,
            });
        }
        Ok(Self { bytes })
    }

    /// Logical length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw view of the content.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Zero the buffer (slot reuse).
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Read up to `max_len` bytes starting at `position`, clamping at
    /// end-of-content. `None` reads everything from `position` to the
    /// end. Reading at or past the end returns an empty, non-clamped
    /// result.
    pub fn read_at(&self, position: usize, max_len: Option<usize>) -> ReadOutcome {
        if position >= self.bytes.len() {
            return ReadOutcome {
                data: Vec::new(),
                clamped: false,
            };
        }
        let remaining = self.bytes.len() - position;
        let (len, clamped) = match max_len {
            Some(want) if want > remaining => (remaining, true),
            Some(want) => (want, false),
            None => (remaining, false),
        };
        ReadOutcome {
            data: self.bytes[position..position + len].to_vec(),
            clamped,
        }
    }

    /// Overwrite-mode write: `data` replaces the region starting at
    /// `position`, zero-padding any gap if `position` is past the end.
    /// Content beyond the replaced region is kept.
    pub fn write_overwrite(&mut self, position: usize, data: &[u8]) -> Result<()> {
        let end = position + data.len();
        let new_len = end.max(self.bytes.len());
        self.check_capacity(new_len)?;

        if position > self.bytes.len() {
            self.bytes.resize(position, 0);
        }
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[position..end].copy_from_slice(data);
        Ok(())
    }

    /// Insert-mode write: `data` is inserted at `position` when before
    /// the end, otherwise appended with zero-padding of the gap. Content
    /// after the cursor is shifted, never dropped.
    pub fn write_insert(&mut self, position: usize, data: &[u8]) -> Result<()> {
        let new_len = self.bytes.len().max(position) + data.len();
        self.check_capacity(new_len)?;

        if position < self.bytes.len() {
            let tail = self.bytes.split_off(position);
            self.bytes.extend_from_slice(data);
            self.bytes.extend_from_slice(&tail);
        } else {
            self.bytes.resize(position, 0);
            self.bytes.extend_from_slice(data);
        }
        Ok(())
    }

    /// Split the content on line boundaries. Lossy on non-UTF-8 bytes;
    /// a trailing newline does not produce an empty final line.
    pub fn lines(&self) -> Vec<String> {
        if self.bytes.is_empty() {
            return Vec::new();
        }
        String::from_utf8_lossy(&self.bytes)
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn check_capacity(&self, new_len: usize) -> Result<()> {
        if new_len >= CONTENT_CAPACITY {
            return Err(Error::CapacityExceeded {
                written: new_len,
                capacity: CONTENT_CAPACITY,
            });
        }
        Ok(())
    }
}
