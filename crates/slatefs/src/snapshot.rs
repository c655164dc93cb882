//! Snapshot persistence.
//!
//! The on-disk format is a portable field-by-field encoding, never a
//! memory image: little-endian fixed-width integers, strings as a u16
//! length prefix plus UTF-8 bytes. Layout:
//!
//! ```text
//! magic    "SLATEFS1" (8 bytes)
//! version  u32 = 1
//! u32 account count, then per account:
//!     slot u32, id u32, name, secret, locked u8, failures u32,
//!     root_dir u32, created i64
//! u32 entry count, then per entry:
//!     address u32 (also the slot), name, kind u8, owner u32,
//!     size u32, created/modified/accessed i64, locked u8,
//!     lock_owner u8+u32, parent u8+u32,
//!     then for files the full content image (CONTENT_CAPACITY bytes)
//! trailer  modify_count u32, next_account_id u32, next_slot u32
//! ```
//!
//! Records are self-addressed, so sparse tables survive a round trip
//! with every slot index preserved. Timestamps are Unix seconds.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::account::{Account, AccountTable};
use crate::content::ContentBuffer;
use crate::entry::{AccountId, Entry, EntryKind, EntryTable, SlotId};
use crate::error::{Error, Result};
use crate::limits::{Limits, CONTENT_CAPACITY};
use crate::store::Store;

const MAGIC: &[u8; 8] = b"SLATEFS1";
const VERSION: u32 = 1;

/// Lifecycle of the persisted image relative to the in-memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistState {
    /// No load attempted yet.
    Uninitialized,
    /// Store matches what was read from disk (or is fresh).
    Loaded,
    /// In-memory mutations not yet written out.
    Dirty,
    /// Last save succeeded and nothing mutated since.
    Saved,
}

/// Owns the snapshot path and tracks the persist lifecycle.
#[derive(Debug)]
pub struct SnapshotEngine {
    path: PathBuf,
    state: PersistState,
}

impl SnapshotEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: PersistState::Uninitialized,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> PersistState {
        self.state
    }

    pub fn mark_dirty(&mut self) {
        self.state = PersistState::Dirty;
    }

    pub fn is_dirty(&self) -> bool {
        self.state == PersistState::Dirty
    }

    /// Load the snapshot, or fall back to a fresh namespace when the
    /// file is absent or malformed. A bad image never poisons startup.
    pub fn load_or_fresh(&mut self, limits: Limits) -> Store {
        let store = match fs::read(&self.path) {
            Ok(bytes) => match decode(&bytes, limits.clone()) {
                Ok(store) => {
                    debug!(
                        path = %self.path.display(),
                        accounts = store.accounts.live_count(),
                        entries = store.entries.live_count(),
                        "snapshot loaded"
                    );
                    store
                }
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        error = %err,
                        "snapshot unreadable, starting fresh"
                    );
                    Store::new(limits)
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot, starting fresh");
                Store::new(limits)
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "snapshot unreadable, starting fresh"
                );
                Store::new(limits)
            }
        };
        self.state = PersistState::Loaded;
        store
    }

    /// Encode the whole store and write it out. The caller holds the
    /// store lock for the full duration, so the image is consistent.
    pub fn save(&mut self, store: &Store) -> Result<()> {
        let bytes = encode(store);
        fs::write(&self.path, &bytes)?;
        self.state = PersistState::Saved;
        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            "snapshot saved"
        );
        Ok(())
    }
}

// ---- encoding --------------------------------------------------------

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_str(&mut self, s: &str) {
        // Names are bounded by Limits::validate_name and secrets by
        // MAX_SECRET_LEN, both far below u16::MAX.
        debug_assert!(s.len() <= u16::MAX as usize);
        self.buf
            .extend_from_slice(&(s.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn put_time(&mut self, t: DateTime<Utc>) {
        self.put_i64(t.timestamp());
    }
}

pub(crate) fn encode(store: &Store) -> Vec<u8> {
    let mut w = Writer::new();
    w.buf.extend_from_slice(MAGIC);
    w.put_u32(VERSION);

    let accounts: Vec<(usize, &Account)> = store.accounts.iter_live().collect();
    w.put_u32(accounts.len() as u32);
    for (slot, account) in accounts {
        w.put_u32(slot as u32);
        w.put_u32(account.id.0);
        w.put_str(&account.name);
        w.put_str(&account.secret);
        w.put_u8(account.locked as u8);
        w.put_u32(account.failures);
        w.put_u32(account.root_dir.0);
        w.put_time(account.created);
    }

    let entries: Vec<(SlotId, &Entry)> = store.entries.iter_live().collect();
    w.put_u32(entries.len() as u32);
    for (slot, entry) in entries {
        debug_assert_eq!(slot, entry.address);
        w.put_u32(entry.address.0);
        w.put_str(&entry.name);
        w.put_u8(match entry.kind {
            EntryKind::File => 0,
            EntryKind::Directory => 1,
        });
        w.put_u32(entry.owner.0);
        w.put_u32(entry.size as u32);
        w.put_time(entry.created);
        w.put_time(entry.modified);
        w.put_time(entry.accessed);
        w.put_u8(entry.locked as u8);
        match entry.lock_owner {
            Some(id) => {
                w.put_u8(1);
                w.put_u32(id.0);
            }
            None => {
                w.put_u8(0);
                w.put_u32(0);
            }
        }
        match entry.parent {
            Some(parent) => {
                w.put_u8(1);
                w.put_u32(parent.0);
            }
            None => {
                w.put_u8(0);
                w.put_u32(0);
            }
        }
        if entry.kind.is_file() {
            let bytes = entry.content.as_bytes();
            w.buf.extend_from_slice(bytes);
            w.buf.resize(w.buf.len() + (CONTENT_CAPACITY - bytes.len()), 0);
        }
    }

    w.put_u32(store.modify_count);
    w.put_u32(store.accounts.next_id());
    w.put_u32(store.entries.cursor());
    w.buf
}

// ---- decoding --------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::Format(format!(
                "truncated snapshot: wanted {n} bytes at offset {}",
                self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn get_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn get_i64(&mut self) -> Result<i64> {
        let bytes = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(arr))
    }

    fn get_str(&mut self) -> Result<String> {
        let len = u16::from_le_bytes({
            let bytes = self.take(2)?;
            [bytes[0], bytes[1]]
        }) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::Format("non-UTF-8 string in snapshot".into()))
    }

    fn get_time(&mut self) -> Result<DateTime<Utc>> {
        let secs = self.get_i64()?;
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| Error::Format(format!("timestamp {secs} out of range")))
    }

    fn get_flag_u32(&mut self) -> Result<Option<u32>> {
        let flag = self.get_u8()?;
        let value = self.get_u32()?;
        Ok((flag != 0).then_some(value))
    }
}

pub(crate) fn decode(bytes: &[u8], limits: Limits) -> Result<Store> {
    let mut r = Reader::new(bytes);

    if r.take(8)? != MAGIC {
        return Err(Error::Format("bad snapshot magic".into()));
    }
    let version = r.get_u32()?;
    if version != VERSION {
        return Err(Error::Format(format!(
            "unsupported snapshot version {version}"
        )));
    }

    let mut accounts = AccountTable::empty(limits.max_accounts);
    let account_count = r.get_u32()? as usize;
    for _ in 0..account_count {
        let slot = r.get_u32()? as usize;
        let account = Account {
            id: AccountId(r.get_u32()?),
            name: r.get_str()?,
            secret: r.get_str()?,
            locked: r.get_u8()? != 0,
            failures: r.get_u32()?,
            root_dir: SlotId(r.get_u32()?),
            created: r.get_time()?,
        };
        accounts.place(slot, account)?;
    }

    let mut entries = EntryTable::empty(limits.max_entries);
    let entry_count = r.get_u32()? as usize;
    for _ in 0..entry_count {
        let address = SlotId(r.get_u32()?);
        let name = r.get_str()?;
        let kind = match r.get_u8()? {
            0 => EntryKind::File,
            1 => EntryKind::Directory,
            other => {
                return Err(Error::Format(format!("unknown entry kind {other}")));
            }
        };
        let owner = AccountId(r.get_u32()?);
        let size = r.get_u32()? as usize;
        let created = r.get_time()?;
        let modified = r.get_time()?;
        let accessed = r.get_time()?;
        let locked = r.get_u8()? != 0;
        let lock_owner = r.get_flag_u32()?.map(AccountId);
        let parent = r.get_flag_u32()?.map(SlotId);

        let content = if kind.is_file() {
            let image = r.take(CONTENT_CAPACITY)?;
            if size >= CONTENT_CAPACITY {
                return Err(Error::Format(format!(
                    "entry '{name}' claims size {size}"
                )));
            }
            ContentBuffer::from_bytes(image[..size].to_vec())?
        } else {
            ContentBuffer::new()
        };

        let entry = Entry {
            name,
            kind,
            owner,
            size,
            address,
            created,
            modified,
            accessed,
            locked,
            lock_owner,
            parent,
            content,
        };
        entries.place(address, entry)?;
    }

    let modify_count = r.get_u32()?;
    accounts.set_next_id(r.get_u32()?);
    entries.set_cursor(r.get_u32()?);

    Ok(Store::from_parts(limits, accounts, entries, modify_count))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::OpenMode;
    use pretty_assertions::assert_eq;

    fn populated_store() -> Store {
        let mut store = Store::new(Limits::default());
        store.register("alice", "pw").unwrap();
        let mut session = store.login("alice", "pw").unwrap();
        let dir = store
            .create(&session, session.root, "docs", EntryKind::Directory)
            .unwrap();
        let file = store.create(&session, dir, "a.txt", EntryKind::File).unwrap();
        let fd = store
            .open_file(&mut session, file, OpenMode::Write)
            .unwrap();
        store.write(&mut session, fd, b"alpha\nbeta\n", false).unwrap();
        session.close(fd).unwrap();
        store.toggle_lock(&session, file).unwrap();
        store
    }

    #[test]
    fn test_round_trip_preserves_slots_and_state() {
        let store = populated_store();
        let bytes = encode(&store);
        let mut restored = decode(&bytes, Limits::default()).unwrap();

        assert_eq!(restored.accounts.live_count(), store.accounts.live_count());
        assert_eq!(restored.entries.live_count(), store.entries.live_count());
        assert_eq!(restored.modify_count, store.modify_count);

        let session = restored.login("alice", "pw").unwrap();
        let file = restored.resolve(&session, "docs/a.txt").unwrap();
        let entry = restored.entry(file).unwrap();
        assert!(entry.locked);
        assert_eq!(entry.size, 11);
        assert_eq!(entry.address, file);
        assert_eq!(restored.export(file).unwrap(), b"alpha\nbeta\n");
    }

    #[test]
    fn test_bad_magic_is_a_format_error() {
        let store = populated_store();
        let mut bytes = encode(&store);
        bytes[0] = b'X';
        assert!(matches!(
            decode(&bytes, Limits::default()),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_unsupported_version_is_a_format_error() {
        let store = populated_store();
        let mut bytes = encode(&store);
        bytes[8..12].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            decode(&bytes, Limits::default()),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_truncated_image_is_a_format_error() {
        let store = populated_store();
        let bytes = encode(&store);
        assert!(matches!(
            decode(&bytes[..bytes.len() / 2], Limits::default()),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_counters_survive_round_trip() {
        let mut store = populated_store();
        let session = store.login("alice", "pw").unwrap();
        let slot = store
            .create(&session, session.root, "probe", EntryKind::File)
            .unwrap();
        store.delete(&session, slot, false).unwrap();

        let mut restored = decode(&encode(&store), Limits::default()).unwrap();
        let session = restored.login("alice", "pw").unwrap();
        // Allocation after a reload never reuses the deleted slot.
        let next = restored
            .create(&session, session.root, "after", EntryKind::File)
            .unwrap();
        assert!(next.0 > slot.0);
    }

    #[test]
    fn test_engine_load_or_fresh_with_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = SnapshotEngine::new(dir.path().join("fs.img"));
        assert_eq!(engine.state(), PersistState::Uninitialized);
        let store = engine.load_or_fresh(Limits::default());
        assert_eq!(engine.state(), PersistState::Loaded);
        assert_eq!(store.accounts.live_count(), 0);
        assert_eq!(store.entries.live_count(), 1);
    }

    #[test]
    fn test_engine_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fs.img");
        let store = populated_store();

        let mut engine = SnapshotEngine::new(&path);
        engine.save(&store).unwrap();
        assert_eq!(engine.state(), PersistState::Saved);

        let mut engine2 = SnapshotEngine::new(&path);
        let restored = engine2.load_or_fresh(Limits::default());
        assert_eq!(restored.accounts.live_count(), 1);
        assert_eq!(restored.entries.live_count(), store.entries.live_count());
    }

    #[test]
    fn test_corrupt_file_degrades_to_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fs.img");
        std::fs::write(&path, b"not a snapshot").unwrap();

        let mut engine = SnapshotEngine::new(&path);
        let store = engine.load_or_fresh(Limits::default());
        assert_eq!(store.accounts.live_count(), 0);
        assert_eq!(store.entries.live_count(), 1);
    }
}
