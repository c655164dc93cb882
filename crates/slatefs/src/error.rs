//! Error types for Slatefs
//!
//! Every core operation returns a typed result; nothing in this crate is
//! allowed to terminate the process. Messages are written for direct
//! display by the shell layer.

use thiserror::Error;

/// Result type alias using Slatefs's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Slatefs error types.
#[derive(Error, Debug)]
pub enum Error {
    /// A path, name, or descriptor does not refer to a live object.
    #[error("not found: {0}")]
    NotFound(String),

    /// A sibling with the same name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The session already holds a live descriptor for this entry.
    #[error("already open (descriptor {0})")]
    AlreadyOpen(usize),

    /// Lock conflict, wrong owner, or an account locked out of login.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The named target is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Bad mode, malformed name, or otherwise unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No free account or entry slot is available.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The write would push content past the fixed buffer capacity.
    #[error("capacity exceeded: {written} bytes would exceed the {capacity} byte buffer")]
    CapacityExceeded { written: usize, capacity: usize },

    /// A seek or read landed outside `0..=size`.
    #[error("out of range: position {position} not within 0..={size}")]
    OutOfRange { position: i64, size: usize },

    /// Underlying storage read/write failure during save or load.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad magic tag or unsupported version in a snapshot file.
    #[error("snapshot format error: {0}")]
    Format(String),

    /// Account locked after repeated failed logins. Permanent: this
    /// design has no unlock operation.
    #[error("account locked: {0}")]
    Locked(String),
}

impl Error {
    /// Create a NotFound error for a named object.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create an AlreadyExists error for a named object.
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists(name.into())
    }
}
