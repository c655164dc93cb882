//! SlateFs - in-memory multi-user filesystem with snapshot persistence
//!
//! A fixed-capacity namespace of files and directories shared by many
//! accounts. Entries live in a slot table, content is capped per file,
//! and the whole store round-trips through a versioned binary snapshot.
//!
//! # Example
//!
//! ```rust
//! use slatefs::{EntryKind, OpenMode, SlateFs};
//!
//! fn main() -> slatefs::Result<()> {
//!     let fs = SlateFs::new();
//!     fs.register("alice", "secret")?;
//!     let mut session = fs.login("alice", "secret")?;
//!
//!     let file = fs.create(&session, session.root, "notes", EntryKind::File)?;
//!     let fd = fs.open(&mut session, file, OpenMode::ReadWrite)?;
//!     fs.write(&mut session, fd, b"hello", false)?;
//!     fs.seek(&mut session, fd, -5)?;
//!     assert_eq!(fs.read(&mut session, fd, None)?.data, b"hello");
//!     Ok(())
//! }
//! ```

mod account;
mod content;
mod entry;
mod error;
mod limits;
mod path;
mod session;
mod snapshot;
mod store;
pub mod worker;

pub use account::{Account, MAX_LOGIN_FAILURES};
pub use content::ReadOutcome;
pub use entry::{AccountId, Entry, EntryKind, SlotId};
pub use error::{Error, Result};
pub use limits::{Limits, CONTENT_CAPACITY, MAX_SECRET_LEN};
pub use session::{DescriptorId, OpenMode, Session};
pub use snapshot::PersistState;
pub use store::{DirRow, LineRange, ToggleOutcome, TreeRow};

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use snapshot::SnapshotEngine;
use store::Store;

/// Main entry point for SlateFs.
///
/// Wraps the shared store in a read-write lock; every public operation
/// takes the lock for its full duration, so a save always sees a
/// consistent image. Sessions are owned by the caller and passed in.
pub struct SlateFs {
    store: RwLock<Store>,
    /// Absent for ephemeral instances that never touch disk.
    engine: Option<Mutex<SnapshotEngine>>,
}

impl Default for SlateFs {
    fn default() -> Self {
        Self::new()
    }
}

impl SlateFs {
    /// An ephemeral instance with default limits and no snapshot file.
    pub fn new() -> Self {
        Self {
            store: RwLock::new(Store::new(Limits::default())),
            engine: None,
        }
    }

    /// Create a new SlateFsBuilder for customized configuration.
    pub fn builder() -> SlateFsBuilder {
        SlateFsBuilder::default()
    }

    // A poisoned lock still holds a structurally valid store, so
    // recover the guard instead of propagating the panic.
    fn store_read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn store_write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }

    fn engine_lock(&self) -> Option<MutexGuard<'_, SnapshotEngine>> {
        self.engine
            .as_ref()
            .map(|engine| engine.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn mark_dirty(&self) {
        if let Some(mut engine) = self.engine_lock() {
            engine.mark_dirty();
        }
    }

    // ---- accounts ----------------------------------------------------

    /// Register a new account. The namespace change is flushed to the
    /// snapshot right away; a failed flush is logged, not returned,
    /// since the registration itself succeeded.
    pub fn register(&self, name: &str, secret: &str) -> Result<AccountId> {
        let id = self.store_write().register(name, secret)?;
        self.mark_dirty();
        if let Err(err) = self.save() {
            warn!(account = name, error = %err, "snapshot flush after registration failed");
        }
        Ok(id)
    }

    /// Authenticate and open a session rooted at the account's home
    /// directory. Three wrong secrets lock the account for good.
    pub fn login(&self, name: &str, secret: &str) -> Result<Session> {
        let result = self.store_write().login(name, secret);
        if matches!(
            result,
            Err(Error::PermissionDenied(_)) | Err(Error::Locked(_))
        ) {
            // The failure counter advanced and must survive a restart.
            self.mark_dirty();
        }
        result
    }

    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.store_read().account(id).cloned()
    }

    // ---- namespace ---------------------------------------------------

    pub fn resolve(&self, session: &Session, path: &str) -> Result<SlotId> {
        self.store_read().resolve(session, path)
    }

    pub fn lookup_child(&self, parent: SlotId, name: &str) -> Option<SlotId> {
        self.store_read().lookup_child(parent, name)
    }

    /// A copy of the entry's metadata and content.
    pub fn stat(&self, slot: SlotId) -> Result<Entry> {
        self.store_read()
            .entry(slot)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("slot {slot}")))
    }

    pub fn create(
        &self,
        session: &Session,
        parent: SlotId,
        name: &str,
        kind: EntryKind,
    ) -> Result<SlotId> {
        let slot = self.store_write().create(session, parent, name, kind)?;
        self.mark_dirty();
        Ok(slot)
    }

    /// Delete an entry; returns how many entries the cascade removed.
    pub fn delete(&self, session: &Session, slot: SlotId, force: bool) -> Result<usize> {
        let removed = self.store_write().delete(session, slot, force)?;
        self.mark_dirty();
        Ok(removed)
    }

    pub fn list_dir(&self, parent: SlotId) -> Result<Vec<DirRow>> {
        self.store_read().list_dir(parent)
    }

    pub fn tree(&self, root: SlotId) -> Result<Vec<TreeRow>> {
        self.store_read().tree(root)
    }

    pub fn current_path(&self, session: &Session) -> String {
        self.store_read().current_path(session)
    }

    pub fn change_dir(&self, session: &mut Session, path: &str) -> Result<()> {
        self.store_write().change_dir(session, path)
    }

    // ---- descriptors and content -------------------------------------

    pub fn open(
        &self,
        session: &mut Session,
        slot: SlotId,
        mode: OpenMode,
    ) -> Result<DescriptorId> {
        self.store_write().open_file(session, slot, mode)
    }

    pub fn close(&self, session: &mut Session, fd: DescriptorId) -> Result<()> {
        session.close(fd)
    }

    pub fn read(
        &self,
        session: &mut Session,
        fd: DescriptorId,
        max_len: Option<usize>,
    ) -> Result<ReadOutcome> {
        self.store_write().read(session, fd, max_len)
    }

    pub fn write(
        &self,
        session: &mut Session,
        fd: DescriptorId,
        data: &[u8],
        overwrite: bool,
    ) -> Result<usize> {
        let written = self.store_write().write(session, fd, data, overwrite)?;
        self.mark_dirty();
        Ok(written)
    }

    pub fn seek(&self, session: &mut Session, fd: DescriptorId, offset: i64) -> Result<usize> {
        self.store_read().seek(session, fd, offset)
    }

    pub fn head(&self, slot: SlotId, n: usize) -> Result<LineRange> {
        self.store_write().head(slot, n)
    }

    pub fn tail(&self, slot: SlotId, n: usize) -> Result<LineRange> {
        self.store_write().tail(slot, n)
    }

    pub fn copy(&self, session: &Session, src: SlotId, dest_dir: SlotId) -> Result<SlotId> {
        let slot = self.store_write().copy(src, dest_dir, session.account)?;
        self.mark_dirty();
        Ok(slot)
    }

    pub fn move_entry(&self, src: SlotId, dest_dir: SlotId) -> Result<()> {
        self.store_write().move_entry(src, dest_dir)?;
        self.mark_dirty();
        Ok(())
    }

    pub fn toggle_lock(&self, session: &Session, slot: SlotId) -> Result<ToggleOutcome> {
        let outcome = self.store_write().toggle_lock(session, slot)?;
        self.mark_dirty();
        Ok(outcome)
    }

    pub fn import(
        &self,
        session: &Session,
        parent: SlotId,
        name: &str,
        data: &[u8],
    ) -> Result<SlotId> {
        let slot = self.store_write().import(session, parent, name, data)?;
        self.mark_dirty();
        Ok(slot)
    }

    pub fn export(&self, slot: SlotId) -> Result<Vec<u8>> {
        self.store_write().export(slot)
    }

    // ---- persistence -------------------------------------------------

    /// Write the snapshot. No-op for ephemeral instances.
    pub fn save(&self) -> Result<()> {
        let Some(engine) = &self.engine else {
            return Ok(());
        };
        let store = self.store_read();
        let mut engine = engine.lock().unwrap_or_else(|e| e.into_inner());
        engine.save(&store)
    }

    pub fn is_dirty(&self) -> bool {
        self.engine_lock().is_some_and(|engine| engine.is_dirty())
    }

    pub fn persist_state(&self) -> PersistState {
        self.engine_lock()
            .map(|engine| engine.state())
            .unwrap_or(PersistState::Uninitialized)
    }

    pub fn limits(&self) -> Limits {
        self.store_read().limits().clone()
    }
}

/// Builder for customized SlateFs configuration.
#[derive(Default)]
pub struct SlateFsBuilder {
    limits: Limits,
    snapshot_path: Option<PathBuf>,
}

impl SlateFsBuilder {
    /// Override the capacity limits.
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Persist to (and load from) a snapshot file at this path.
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Build the instance, loading the snapshot when a path was given.
    /// A missing or malformed snapshot degrades to a fresh namespace.
    pub fn build(self) -> SlateFs {
        match self.snapshot_path {
            Some(path) => {
                let mut engine = SnapshotEngine::new(path);
                let store = engine.load_or_fresh(self.limits);
                SlateFs {
                    store: RwLock::new(store),
                    engine: Some(Mutex::new(engine)),
                }
            }
            None => SlateFs {
                store: RwLock::new(Store::new(self.limits)),
                engine: None,
            },
        }
    }
}
