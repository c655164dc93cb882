//! Capacity limits for the slot tables.
//!
//! Defaults match the sizes the snapshot format was designed around:
//! 100 account slots, 10,000 entry slots, 63-byte names. The content
//! buffer capacity is a fixed constant because the snapshot encodes a
//! full-capacity image per file.

use crate::error::{Error, Result};

/// Fixed content buffer capacity per file slot, in bytes. A file's
/// logical length must stay strictly below this (the last byte is
/// reserved, so the largest storable file is 4095 bytes).
pub const CONTENT_CAPACITY: usize = 4096;

/// Default maximum number of account slots.
pub const DEFAULT_MAX_ACCOUNTS: usize = 100;

/// Default maximum number of entry slots.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Default maximum entry/account name length in bytes.
pub const DEFAULT_MAX_NAME_LEN: usize = 63;

/// Maximum account secret length in bytes. Fixed rather than
/// configurable: the snapshot encodes strings behind a u16 length
/// prefix, so every persisted string must stay well below u16::MAX.
pub const MAX_SECRET_LEN: usize = 255;

/// Table capacities.
///
/// # Example
///
/// ```rust
/// use slatefs::Limits;
///
/// let limits = Limits::new().max_accounts(10).max_entries(256);
/// assert_eq!(limits.max_accounts, 10);
/// ```
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum number of account slots. Default: 100.
    pub max_accounts: usize,
    /// Maximum number of entry slots. Default: 10,000.
    pub max_entries: usize,
    /// Maximum name length in bytes. Default: 63.
    pub max_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_accounts: DEFAULT_MAX_ACCOUNTS,
            max_entries: DEFAULT_MAX_ENTRIES,
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

impl Limits {
    /// Create new limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of account slots.
    pub fn max_accounts(mut self, n: usize) -> Self {
        self.max_accounts = n;
        self
    }

    /// Set the maximum number of entry slots.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the maximum name length in bytes.
    pub fn max_name_len(mut self, n: usize) -> Self {
        self.max_name_len = n;
        self
    }

    /// Validate a single entry or account name.
    ///
    /// Names are single path components: non-empty, within the length
    /// limit, and free of `/`, NUL, and other control characters.
    pub fn validate_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("name must not be empty".into()));
        }
        if name.len() > self.max_name_len {
            return Err(Error::InvalidArgument(format!(
                "name too long: {} bytes exceeds {} byte limit",
                name.len(),
                self.max_name_len
            )));
        }
        if name == "." || name == ".." {
            return Err(Error::InvalidArgument(format!("reserved name: {name}")));
        }
        if let Some(ch) = name.chars().find(|c| *c == '/' || c.is_control()) {
            return Err(Error::InvalidArgument(format!(
                "unsafe character U+{:04X} in name '{name}'",
                ch as u32
            )));
        }
        Ok(())
    }
}
