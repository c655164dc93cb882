//! The shared store: account table + entry table + global counters.
//!
//! One `Store` is the unit of locking and of persistence. All
//! cross-table operations live here; [`crate::SlateFs`] wraps a store
//! in a read-write lock and exposes the public surface.

use chrono::{DateTime, Utc};

use crate::account::{Account, AccountTable};
use crate::content::ReadOutcome;
use crate::entry::{AccountId, Entry, EntryKind, EntryTable, SlotId};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::path;
use crate::session::{DescriptorId, OpenMode, Session};

/// One row of a directory listing.
#[derive(Debug, Clone)]
pub struct DirRow {
    pub slot: SlotId,
    pub name: String,
    pub kind: EntryKind,
    pub size: usize,
    pub modified: DateTime<Utc>,
}

/// One row of a tree rendering, depth-first pre-order.
#[derive(Debug, Clone)]
pub struct TreeRow {
    pub slot: SlotId,
    pub name: String,
    pub kind: EntryKind,
    pub size: usize,
    pub depth: usize,
}

/// Result of a lock toggle.
#[derive(Debug, Clone, Copy)]
pub struct ToggleOutcome {
    /// Lock state after the toggle.
    pub locked: bool,
    /// True when the session holds an open descriptor on the entry;
    /// the toggle still succeeded, but callers should warn.
    pub open_descriptor: bool,
}

/// Numbered lines returned by head/tail. `start` is the 1-based number
/// of the first returned line; `lines` is empty for an empty file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub lines: Vec<String>,
}

/// Accounts, entries, and the counters the snapshot carries.
#[derive(Debug)]
pub struct Store {
    limits: Limits,
    pub(crate) accounts: AccountTable,
    pub(crate) entries: EntryTable,
    /// Total number of mutations since the namespace was created;
    /// persisted for diagnostics, never interpreted.
    pub(crate) modify_count: u32,
}

impl Store {
    /// A fresh namespace: the global root and nothing else.
    pub fn new(limits: Limits) -> Self {
        Self {
            accounts: AccountTable::new(&limits),
            entries: EntryTable::new(&limits),
            limits,
            modify_count: 0,
        }
    }

    /// Reassemble a store from decoded snapshot parts.
    pub(crate) fn from_parts(
        limits: Limits,
        accounts: AccountTable,
        entries: EntryTable,
        modify_count: u32,
    ) -> Self {
        Self {
            limits,
            accounts,
            entries,
            modify_count,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    fn touch(&mut self) {
        self.modify_count += 1;
    }

    // ---- accounts ----------------------------------------------------

    /// Register a new account and create its root directory under the
    /// global root, named after the account.
    ///
    /// If the directory cannot be created the claimed account slot is
    /// released again; a failed registration leaves nothing behind.
    pub fn register(&mut self, name: &str, secret: &str) -> Result<AccountId> {
        self.limits.validate_name(name)?;
        if secret.is_empty() {
            return Err(Error::InvalidArgument("secret must not be empty".into()));
        }
        if secret.len() > crate::limits::MAX_SECRET_LEN {
            return Err(Error::InvalidArgument(format!(
                "secret too long: {} bytes exceeds the {} byte limit",
                secret.len(),
                crate::limits::MAX_SECRET_LEN
            )));
        }

        let slot = self.accounts.claim(name, secret)?;
        let id = match self.accounts.slot_mut(slot) {
            Some(account) => account.id,
            None => return Err(Error::not_found(name)),
        };

        let root_dir = match self.entries.create(name, EntryKind::Directory, id, SlotId::ROOT) {
            Ok(dir) => dir,
            Err(err) => {
                self.accounts.release(slot);
                return Err(err);
            }
        };
        if let Some(account) = self.accounts.slot_mut(slot) {
            account.root_dir = root_dir;
        }
        self.touch();
        Ok(id)
    }

    /// Authenticate and start a session at the account's root.
    pub fn login(&mut self, name: &str, secret: &str) -> Result<Session> {
        let id = self.accounts.login(name, secret)?;
        let root = self
            .accounts
            .find_by_id(id)
            .map(|account| account.root_dir)
            .ok_or_else(|| Error::not_found(name))?;
        Ok(Session::new(id, root))
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.find_by_id(id)
    }

    // ---- namespace ---------------------------------------------------

    /// Resolve a path from the session's current directory (or its root
    /// for absolute paths).
    pub fn resolve(&self, session: &Session, p: &str) -> Result<SlotId> {
        path::resolve(&self.entries, session.root, session.cwd, p)
    }

    /// Exact-name child lookup under `parent`.
    pub fn lookup_child(&self, parent: SlotId, name: &str) -> Option<SlotId> {
        self.entries.lookup_child(parent, name)
    }

    pub fn entry(&self, slot: SlotId) -> Option<&Entry> {
        self.entries.get(slot)
    }

    /// Create a file or directory under `parent`, owned by the caller.
    pub fn create(
        &mut self,
        session: &Session,
        parent: SlotId,
        name: &str,
        kind: EntryKind,
    ) -> Result<SlotId> {
        self.limits.validate_name(name)?;
        if !self
            .entries
            .get(parent)
            .is_some_and(|entry| entry.kind.is_dir())
        {
            return Err(Error::NotADirectory(format!("slot {parent}")));
        }
        let slot = self.entries.create(name, kind, session.account, parent)?;
        self.touch();
        Ok(slot)
    }

    /// Soft-delete an entry.
    ///
    /// Files: refused while locked or while the session holds an open
    /// descriptor on them. Directories: only the owner may delete, and
    /// a non-empty directory needs `force`; the cascade then removes
    /// the whole subtree (collect-then-delete at every level).
    pub fn delete(&mut self, session: &Session, slot: SlotId, force: bool) -> Result<usize> {
        let entry = self
            .entries
            .get(slot)
            .ok_or_else(|| Error::not_found(format!("slot {slot}")))?;

        match entry.kind {
            EntryKind::File => {
                self.check_access(slot, true)?;
                if session.find_open(slot).is_some() {
                    return Err(Error::PermissionDenied(format!(
                        "file '{}' is in use; close it first",
                        entry.name
                    )));
                }
            }
            EntryKind::Directory => {
                if entry.owner != session.account {
                    return Err(Error::PermissionDenied(format!(
                        "directory '{}' belongs to another account",
                        entry.name
                    )));
                }
                if self.entries.children(slot).next().is_some() && !force {
                    return Err(Error::InvalidArgument(format!(
                        "directory '{}' is not empty",
                        entry.name
                    )));
                }
            }
        }

        let removed = self.entries.delete(slot)?;
        self.touch();
        Ok(removed)
    }

    /// Live children of `parent` as listing rows.
    pub fn list_dir(&self, parent: SlotId) -> Result<Vec<DirRow>> {
        let entry = self
            .entries
            .get(parent)
            .ok_or_else(|| Error::not_found(format!("slot {parent}")))?;
        if !entry.kind.is_dir() {
            return Err(Error::NotADirectory(entry.name.clone()));
        }
        Ok(self
            .entries
            .children(parent)
            .map(|(slot, entry)| DirRow {
                slot,
                name: entry.name.clone(),
                kind: entry.kind,
                size: entry.size,
                modified: entry.modified,
            })
            .collect())
    }

    /// Depth-first pre-order rendering of the subtree at `root`.
    pub fn tree(&self, root: SlotId) -> Result<Vec<TreeRow>> {
        if self.entries.get(root).is_none() {
            return Err(Error::not_found(format!("slot {root}")));
        }
        let mut rows = Vec::new();
        self.entries.tree_walk(root, &mut |slot, entry, depth| {
            rows.push(TreeRow {
                slot,
                name: entry.name.clone(),
                kind: entry.kind,
                size: entry.size,
                depth,
            });
        });
        Ok(rows)
    }

    /// Absolute path of the session's current directory, for prompts.
    pub fn current_path(&self, session: &Session) -> String {
        path::absolute_path(&self.entries, session.root, session.cwd)
    }

    /// Change the session's current directory. `..` stops at the
    /// session root; entering a directory updates its accessed time.
    pub fn change_dir(&mut self, session: &mut Session, p: &str) -> Result<()> {
        let target = self.resolve(session, p)?;
        let entry = self
            .entries
            .get_mut(target)
            .ok_or_else(|| Error::not_found(p))?;
        if !entry.kind.is_dir() {
            return Err(Error::NotADirectory(entry.name.clone()));
        }
        entry.accessed = Utc::now();
        session.cwd = target;
        Ok(())
    }

    // ---- access control ----------------------------------------------

    /// Deny writes to a locked entry for every account, including the
    /// lock owner. Reads are always permitted.
    pub fn check_access(&self, slot: SlotId, needs_write: bool) -> Result<()> {
        let entry = self
            .entries
            .get(slot)
            .ok_or_else(|| Error::not_found(format!("slot {slot}")))?;
        if entry.locked && needs_write {
            let holder = entry
                .lock_owner
                .and_then(|id| self.accounts.find_by_id(id))
                .map(|account| account.name.clone())
                .unwrap_or_else(|| "unknown".into());
            return Err(Error::PermissionDenied(format!(
                "'{}' is locked read-only by {holder}",
                entry.name
            )));
        }
        Ok(())
    }

    /// Toggle the lock on a file.
    ///
    /// Unlocked: lock it, recording the caller as owner. Locked by the
    /// caller: clear it. Locked by someone else: refused. Toggling
    /// while the session holds an open descriptor succeeds but is
    /// flagged for a caller warning.
    pub fn toggle_lock(&mut self, session: &Session, slot: SlotId) -> Result<ToggleOutcome> {
        let open_descriptor = session.find_open(slot).is_some();
        let caller = session.account;
        let entry = self
            .entries
            .get_mut(slot)
            .ok_or_else(|| Error::not_found(format!("slot {slot}")))?;
        if !entry.kind.is_file() {
            return Err(Error::not_found(entry.name.clone()));
        }

        if entry.locked {
            if entry.lock_owner != Some(caller) {
                return Err(Error::PermissionDenied(format!(
                    "'{}' is locked by another account",
                    entry.name
                )));
            }
            entry.locked = false;
            entry.lock_owner = None;
        } else {
            entry.locked = true;
            entry.lock_owner = Some(caller);
            entry.modified = Utc::now();
        }
        let locked = entry.locked;
        self.touch();
        Ok(ToggleOutcome {
            locked,
            open_descriptor,
        })
    }

    // ---- descriptors and content -------------------------------------

    /// Open a descriptor on a file entry. Directories are treated as
    /// absent for open.
    pub fn open_file(
        &mut self,
        session: &mut Session,
        slot: SlotId,
        mode: OpenMode,
    ) -> Result<DescriptorId> {
        let entry = self
            .entries
            .get(slot)
            .ok_or_else(|| Error::not_found(format!("slot {slot}")))?;
        if !entry.kind.is_file() {
            return Err(Error::not_found(entry.name.clone()));
        }
        session.open(slot, mode)
    }

    /// Read through a descriptor, clamping at end-of-content and
    /// advancing the cursor by the bytes actually returned.
    pub fn read(
        &mut self,
        session: &mut Session,
        fd: DescriptorId,
        max_len: Option<usize>,
    ) -> Result<ReadOutcome> {
        let descriptor = session.descriptor(fd)?;
        if !descriptor.mode.can_read() {
            return Err(Error::InvalidArgument(format!(
                "descriptor {fd} is write-only"
            )));
        }
        let target = descriptor.target;
        let position = descriptor.position;

        let entry = self
            .entries
            .get_mut(target)
            .ok_or_else(|| Error::not_found(format!("slot {target}")))?;
        let outcome = entry.content.read_at(position, max_len);
        entry.accessed = Utc::now();

        session.descriptor_mut(fd)?.position = position + outcome.data.len();
        Ok(outcome)
    }

    /// Write through a descriptor.
    ///
    /// `overwrite` replaces the region at the cursor; otherwise bytes
    /// are inserted at the cursor (appended, zero-padding any gap, when
    /// the cursor is at or past the end). Both paths keep content that
    /// follows the cursor. Advances the cursor by the written length.
    pub fn write(
        &mut self,
        session: &mut Session,
        fd: DescriptorId,
        data: &[u8],
        overwrite: bool,
    ) -> Result<usize> {
        let descriptor = session.descriptor(fd)?;
        if !descriptor.mode.can_write() {
            return Err(Error::InvalidArgument(format!(
                "descriptor {fd} is read-only"
            )));
        }
        let target = descriptor.target;
        let position = descriptor.position;
        self.check_access(target, true)?;

        let entry = self
            .entries
            .get_mut(target)
            .ok_or_else(|| Error::not_found(format!("slot {target}")))?;
        if overwrite {
            entry.content.write_overwrite(position, data)?;
        } else {
            entry.content.write_insert(position, data)?;
        }
        entry.size = entry.content.len();
        entry.modified = Utc::now();

        session.descriptor_mut(fd)?.position = position + data.len();
        self.touch();
        Ok(data.len())
    }

    /// Move a descriptor's cursor by a signed offset. The new position
    /// must stay within `0..=size`; no sparse extension via seek.
    pub fn seek(&self, session: &mut Session, fd: DescriptorId, offset: i64) -> Result<usize> {
        let descriptor = session.descriptor(fd)?;
        let size = self
            .entries
            .get(descriptor.target)
            .map(|entry| entry.size)
            .ok_or_else(|| Error::not_found(format!("slot {}", descriptor.target)))?;

        let wanted = descriptor.position as i64 + offset;
        if wanted < 0 || wanted as usize > size {
            return Err(Error::OutOfRange {
                position: wanted,
                size,
            });
        }
        let new_position = wanted as usize;
        session.descriptor_mut(fd)?.position = new_position;
        Ok(new_position)
    }

    /// First `n` lines of a file. An empty file yields an empty range,
    /// distinct from `NotFound`.
    pub fn head(&mut self, slot: SlotId, n: usize) -> Result<LineRange> {
        let lines = self.file_lines(slot)?;
        let taken: Vec<String> = lines.into_iter().take(n).collect();
        Ok(LineRange {
            start: if taken.is_empty() { 0 } else { 1 },
            lines: taken,
        })
    }

    /// Last `n` lines of a file, numbered from their true position.
    pub fn tail(&mut self, slot: SlotId, n: usize) -> Result<LineRange> {
        let lines = self.file_lines(slot)?;
        let start = lines.len().saturating_sub(n);
        let taken: Vec<String> = lines[start..].to_vec();
        Ok(LineRange {
            start: if taken.is_empty() { 0 } else { start + 1 },
            lines: taken,
        })
    }

    fn file_lines(&mut self, slot: SlotId) -> Result<Vec<String>> {
        let entry = self
            .entries
            .get_mut(slot)
            .ok_or_else(|| Error::not_found(format!("slot {slot}")))?;
        if !entry.kind.is_file() {
            return Err(Error::not_found(entry.name.clone()));
        }
        entry.accessed = Utc::now();
        Ok(entry.content.lines())
    }

    /// Copy a file into `dest_dir` under its own name, owned by
    /// `new_owner`, duplicating the full content buffer and size.
    pub fn copy(
        &mut self,
        src: SlotId,
        dest_dir: SlotId,
        new_owner: AccountId,
    ) -> Result<SlotId> {
        let (name, content, size) = {
            let entry = self
                .entries
                .get(src)
                .ok_or_else(|| Error::not_found(format!("slot {src}")))?;
            if !entry.kind.is_file() {
                return Err(Error::not_found(entry.name.clone()));
            }
            (entry.name.clone(), entry.content.clone(), entry.size)
        };
        self.require_dir(dest_dir)?;
        if self.entries.lookup_child(dest_dir, &name).is_some() {
            return Err(Error::already_exists(name));
        }

        let new_slot = self
            .entries
            .create(&name, EntryKind::File, new_owner, dest_dir)?;
        let entry = self
            .entries
            .get_mut(new_slot)
            .ok_or_else(|| Error::not_found(format!("slot {new_slot}")))?;
        entry.content = content;
        entry.size = size;
        entry.modified = Utc::now();
        self.touch();
        Ok(new_slot)
    }

    /// Re-parent a file into `dest_dir` without copying content.
    pub fn move_entry(&mut self, src: SlotId, dest_dir: SlotId) -> Result<()> {
        let name = {
            let entry = self
                .entries
                .get(src)
                .ok_or_else(|| Error::not_found(format!("slot {src}")))?;
            if !entry.kind.is_file() {
                return Err(Error::not_found(entry.name.clone()));
            }
            entry.name.clone()
        };
        self.require_dir(dest_dir)?;
        if self.entries.lookup_child(dest_dir, &name).is_some() {
            return Err(Error::already_exists(name));
        }

        let entry = self
            .entries
            .get_mut(src)
            .ok_or_else(|| Error::not_found(format!("slot {src}")))?;
        entry.parent = Some(dest_dir);
        entry.modified = Utc::now();
        self.touch();
        Ok(())
    }

    fn require_dir(&self, slot: SlotId) -> Result<()> {
        let entry = self
            .entries
            .get(slot)
            .ok_or_else(|| Error::not_found(format!("slot {slot}")))?;
        if !entry.kind.is_dir() {
            return Err(Error::NotADirectory(entry.name.clone()));
        }
        Ok(())
    }

    /// Import external bytes as a new file under `parent`. Enforces the
    /// same uniqueness and capacity rules as create + write; nothing is
    /// created when the bytes do not fit.
    pub fn import(
        &mut self,
        session: &Session,
        parent: SlotId,
        name: &str,
        data: &[u8],
    ) -> Result<SlotId> {
        if data.len() >= crate::limits::CONTENT_CAPACITY {
            return Err(Error::CapacityExceeded {
                written: data.len(),
                capacity: crate::limits::CONTENT_CAPACITY,
            });
        }
        let slot = self.create(session, parent, name, EntryKind::File)?;
        let entry = self
            .entries
            .get_mut(slot)
            .ok_or_else(|| Error::not_found(name))?;
        entry.content.write_overwrite(0, data)?;
        entry.size = entry.content.len();
        entry.modified = Utc::now();
        self.touch();
        Ok(slot)
    }

    /// Export a file's content bytes. Requires only read access, which
    /// the lock never denies; updates the accessed timestamp.
    pub fn export(&mut self, slot: SlotId) -> Result<Vec<u8>> {
        self.check_access(slot, false)?;
        let entry = self
            .entries
            .get_mut(slot)
            .ok_or_else(|| Error::not_found(format!("slot {slot}")))?;
        if !entry.kind.is_file() {
            return Err(Error::not_found(entry.name.clone()));
        }
        entry.accessed = Utc::now();
        Ok(entry.content.as_bytes().to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store_with_session() -> (Store, Session) {
        let mut store = Store::new(Limits::default());
        store.register("alice", "pw").unwrap();
        let session = store.login("alice", "pw").unwrap();
        (store, session)
    }

    #[test]
    fn test_register_creates_root_dir() {
        let (store, session) = store_with_session();
        let root = store.entry(session.root).unwrap();
        assert_eq!(root.name, "alice");
        assert!(root.kind.is_dir());
        assert_eq!(root.parent, Some(SlotId::ROOT));
    }

    #[test]
    fn test_register_rejects_empty_secret() {
        let mut store = Store::new(Limits::default());
        assert!(matches!(
            store.register("bob", ""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_register_bounds_the_secret_length() {
        let mut store = Store::new(Limits::default());
        let too_long = "s".repeat(crate::limits::MAX_SECRET_LEN + 1);
        assert!(matches!(
            store.register("bob", &too_long),
            Err(Error::InvalidArgument(_))
        ));
        // Nothing was claimed by the failed registration.
        assert_eq!(store.accounts.live_count(), 0);
        assert_eq!(store.entries.live_count(), 1);

        let at_limit = "s".repeat(crate::limits::MAX_SECRET_LEN);
        store.register("bob", &at_limit).unwrap();
        assert!(store.login("bob", &at_limit).is_ok());
    }

    #[test]
    fn test_write_then_read_through_descriptor() {
        let (mut store, mut session) = store_with_session();
        let file = store
            .create(&session, session.root, "notes", EntryKind::File)
            .unwrap();
        let fd = store
            .open_file(&mut session, file, OpenMode::ReadWrite)
            .unwrap();

        store.write(&mut session, fd, b"hello", false).unwrap();
        store.seek(&mut session, fd, -5).unwrap();
        let outcome = store.read(&mut session, fd, None).unwrap();
        assert_eq!(outcome.data, b"hello");
        assert!(!outcome.clamped);
    }

    #[test]
    fn test_read_only_descriptor_rejects_write() {
        let (mut store, mut session) = store_with_session();
        let file = store
            .create(&session, session.root, "ro", EntryKind::File)
            .unwrap();
        let fd = store.open_file(&mut session, file, OpenMode::Read).unwrap();
        assert!(matches!(
            store.write(&mut session, fd, b"x", false),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_locked_file_denies_write_even_for_owner() {
        let (mut store, mut session) = store_with_session();
        let file = store
            .create(&session, session.root, "guarded", EntryKind::File)
            .unwrap();
        let outcome = store.toggle_lock(&session, file).unwrap();
        assert!(outcome.locked);

        let fd = store
            .open_file(&mut session, file, OpenMode::Write)
            .unwrap();
        assert!(matches!(
            store.write(&mut session, fd, b"x", false),
            Err(Error::PermissionDenied(_))
        ));

        // Reads stay permitted while locked.
        assert!(store.export(file).is_ok());
    }

    #[test]
    fn test_only_lock_owner_may_unlock() {
        let (mut store, session) = store_with_session();
        store.register("bob", "pw").unwrap();
        let other = store.login("bob", "pw").unwrap();

        let file = store
            .create(&session, session.root, "mine", EntryKind::File)
            .unwrap();
        store.toggle_lock(&session, file).unwrap();
        assert!(matches!(
            store.toggle_lock(&other, file),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_delete_refused_while_descriptor_open() {
        let (mut store, mut session) = store_with_session();
        let file = store
            .create(&session, session.root, "busy", EntryKind::File)
            .unwrap();
        let fd = store.open_file(&mut session, file, OpenMode::Read).unwrap();
        assert!(matches!(
            store.delete(&session, file, false),
            Err(Error::PermissionDenied(_))
        ));
        session.close(fd).unwrap();
        assert_eq!(store.delete(&session, file, false).unwrap(), 1);
    }

    #[test]
    fn test_delete_non_empty_dir_needs_force() {
        let (mut store, session) = store_with_session();
        let dir = store
            .create(&session, session.root, "d", EntryKind::Directory)
            .unwrap();
        store.create(&session, dir, "f", EntryKind::File).unwrap();

        assert!(matches!(
            store.delete(&session, dir, false),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(store.delete(&session, dir, true).unwrap(), 2);
        assert!(store.entry(dir).is_none());
    }

    #[test]
    fn test_seek_rejects_positions_outside_bounds() {
        let (mut store, mut session) = store_with_session();
        let file = store
            .create(&session, session.root, "s", EntryKind::File)
            .unwrap();
        let fd = store
            .open_file(&mut session, file, OpenMode::ReadWrite)
            .unwrap();
        store.write(&mut session, fd, b"abc", false).unwrap();

        assert!(matches!(
            store.seek(&mut session, fd, 1),
            Err(Error::OutOfRange { position: 4, size: 3 })
        ));
        assert!(matches!(
            store.seek(&mut session, fd, -4),
            Err(Error::OutOfRange { position: -1, .. })
        ));
        assert_eq!(store.seek(&mut session, fd, -3).unwrap(), 0);
    }

    #[test]
    fn test_head_and_tail_line_numbering() {
        let (mut store, mut session) = store_with_session();
        let file = store
            .create(&session, session.root, "log", EntryKind::File)
            .unwrap();
        let fd = store
            .open_file(&mut session, file, OpenMode::Write)
            .unwrap();
        store
            .write(&mut session, fd, b"one\ntwo\nthree\nfour\n", false)
            .unwrap();

        let head = store.head(file, 2).unwrap();
        assert_eq!(head.start, 1);
        assert_eq!(head.lines, vec!["one", "two"]);

        let tail = store.tail(file, 2).unwrap();
        assert_eq!(tail.start, 3);
        assert_eq!(tail.lines, vec!["three", "four"]);
    }

    #[test]
    fn test_head_of_empty_file_is_empty_not_missing() {
        let (mut store, session) = store_with_session();
        let file = store
            .create(&session, session.root, "empty", EntryKind::File)
            .unwrap();
        let head = store.head(file, 5).unwrap();
        assert_eq!(head.start, 0);
        assert!(head.lines.is_empty());
    }

    #[test]
    fn test_copy_duplicates_content_with_new_owner() {
        let (mut store, mut session) = store_with_session();
        store.register("bob", "pw").unwrap();
        let bob = store.login("bob", "pw").unwrap();

        let file = store
            .create(&session, session.root, "orig", EntryKind::File)
            .unwrap();
        let fd = store
            .open_file(&mut session, file, OpenMode::Write)
            .unwrap();
        store.write(&mut session, fd, b"payload", false).unwrap();

        let copied = store.copy(file, bob.root, bob.account).unwrap();
        let entry = store.entry(copied).unwrap();
        assert_eq!(entry.owner, bob.account);
        assert_eq!(entry.size, 7);
        assert_eq!(store.export(copied).unwrap(), b"payload");
        // Source untouched.
        assert_eq!(store.export(file).unwrap(), b"payload");
    }

    #[test]
    fn test_move_reparents_without_copying() {
        let (mut store, session) = store_with_session();
        let dir = store
            .create(&session, session.root, "inbox", EntryKind::Directory)
            .unwrap();
        let file = store
            .create(&session, session.root, "msg", EntryKind::File)
            .unwrap();

        store.move_entry(file, dir).unwrap();
        assert_eq!(store.entry(file).unwrap().parent, Some(dir));
        assert!(store.lookup_child(session.root, "msg").is_none());
        assert_eq!(store.lookup_child(dir, "msg"), Some(file));
    }

    #[test]
    fn test_move_rejects_name_collision_in_dest() {
        let (mut store, session) = store_with_session();
        let dir = store
            .create(&session, session.root, "d", EntryKind::Directory)
            .unwrap();
        store.create(&session, dir, "msg", EntryKind::File).unwrap();
        let file = store
            .create(&session, session.root, "msg", EntryKind::File)
            .unwrap();
        assert!(matches!(
            store.move_entry(file, dir),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_import_rejects_oversized_payload_without_creating() {
        let (mut store, session) = store_with_session();
        let big = vec![0u8; crate::limits::CONTENT_CAPACITY];
        assert!(matches!(
            store.import(&session, session.root, "big", &big),
            Err(Error::CapacityExceeded { .. })
        ));
        assert!(store.lookup_child(session.root, "big").is_none());
    }

    #[test]
    fn test_change_dir_and_current_path() {
        let (mut store, mut session) = store_with_session();
        let dir = store
            .create(&session, session.root, "sub", EntryKind::Directory)
            .unwrap();
        store.create(&session, dir, "leaf", EntryKind::Directory).unwrap();

        store.change_dir(&mut session, "sub/leaf").unwrap();
        assert_eq!(store.current_path(&session), "/sub/leaf");
        store.change_dir(&mut session, "..").unwrap();
        assert_eq!(store.current_path(&session), "/sub");
        store.change_dir(&mut session, "/").unwrap();
        assert_eq!(store.current_path(&session), "/");
    }

    #[test]
    fn test_change_dir_to_file_fails() {
        let (mut store, mut session) = store_with_session();
        store
            .create(&session, session.root, "f", EntryKind::File)
            .unwrap();
        assert!(matches!(
            store.change_dir(&mut session, "f"),
            Err(Error::NotADirectory(_))
        ));
    }
}
