//! Sessions and open-file descriptors.
//!
//! A session is private to one logged-in account: descriptor state is
//! never shared across sessions, so no locking is needed here. Closed
//! descriptor slots are recycled before the table grows.

use crate::entry::{AccountId, SlotId};
use crate::error::{Error, Result};

/// Index into a session's descriptor table. Stable while the
/// descriptor is open; reusable after close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorId(pub usize);

impl std::fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Open mode for a file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    pub fn can_read(&self) -> bool {
        !matches!(self, OpenMode::Write)
    }

    pub fn can_write(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

impl std::str::FromStr for OpenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(OpenMode::Read),
            "w" => Ok(OpenMode::Write),
            "rw" => Ok(OpenMode::ReadWrite),
            other => Err(Error::InvalidArgument(format!(
                "unknown open mode '{other}', expected r/w/rw"
            ))),
        }
    }
}

/// One open-file handle: target entry, byte cursor, and mode.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub target: SlotId,
    pub owner: AccountId,
    pub position: usize,
    pub mode: OpenMode,
    pub open: bool,
}

/// Per-login session: identity, current directory, open files.
#[derive(Debug, Clone)]
pub struct Session {
    /// The logged-in account.
    pub account: AccountId,
    /// The account's own root directory (resolution anchor).
    pub root: SlotId,
    /// Current directory for relative paths.
    pub cwd: SlotId,
    descriptors: Vec<FileDescriptor>,
}

impl Session {
    /// Start a session at the account's root directory.
    pub fn new(account: AccountId, root: SlotId) -> Self {
        Self {
            account,
            root,
            cwd: root,
            descriptors: Vec::new(),
        }
    }

    /// The live descriptor already targeting `slot`, if any.
    pub fn find_open(&self, slot: SlotId) -> Option<DescriptorId> {
        self.descriptors
            .iter()
            .position(|fd| fd.open && fd.target == slot)
            .map(DescriptorId)
    }

    /// Open a descriptor on `slot`.
    ///
    /// At most one live descriptor per target entry per session; a
    /// duplicate open fails with `AlreadyOpen` naming the existing
    /// descriptor. The first closed slot is reused before appending.
    pub fn open(&mut self, slot: SlotId, mode: OpenMode) -> Result<DescriptorId> {
        if let Some(existing) = self.find_open(slot) {
            return Err(Error::AlreadyOpen(existing.0));
        }
        let descriptor = FileDescriptor {
            target: slot,
            owner: self.account,
            position: 0,
            mode,
            open: true,
        };
        if let Some(idx) = self.descriptors.iter().position(|fd| !fd.open) {
            self.descriptors[idx] = descriptor;
            return Ok(DescriptorId(idx));
        }
        self.descriptors.push(descriptor);
        Ok(DescriptorId(self.descriptors.len() - 1))
    }

    /// Close a descriptor. The record is kept (marked closed) so its
    /// slot can be reused by a later open.
    pub fn close(&mut self, fd: DescriptorId) -> Result<()> {
        match self.descriptors.get_mut(fd.0) {
            Some(descriptor) if descriptor.open => {
                descriptor.open = false;
                Ok(())
            }
            _ => Err(Error::not_found(format!("descriptor {fd}"))),
        }
    }

    /// Borrow a live descriptor.
    pub fn descriptor(&self, fd: DescriptorId) -> Result<&FileDescriptor> {
        match self.descriptors.get(fd.0) {
            Some(descriptor) if descriptor.open => Ok(descriptor),
            _ => Err(Error::not_found(format!("descriptor {fd}"))),
        }
    }

    /// Mutably borrow a live descriptor.
    pub fn descriptor_mut(&mut self, fd: DescriptorId) -> Result<&mut FileDescriptor> {
        match self.descriptors.get_mut(fd.0) {
            Some(descriptor) if descriptor.open => Ok(descriptor),
            _ => Err(Error::not_found(format!("descriptor {fd}"))),
        }
    }
}
