//! The slot-based entry table: files and directories.
//!
//! Entries live in a fixed-capacity table and are addressed by a stable
//! [`SlotId`] for their lifetime. Slot 0 is the permanent namespace
//! root; every account's own root directory is a direct child of it.
//! Deleted slots are soft-released and reusable.

use chrono::{DateTime, Utc};

use crate::content::ContentBuffer;
use crate::error::{Error, Result};
use crate::limits::Limits;

/// Stable index into the entry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl SlotId {
    /// The permanent global namespace root.
    pub const ROOT: SlotId = SlotId(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique account identity, distinct from the account's table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub u32);

impl AccountId {
    /// Owner of the global root and nothing else.
    pub const SYSTEM: AccountId = AccountId(0);
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// A namespace entry: one file or directory.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Name, unique among live siblings (case-sensitive exact match).
    pub name: String,
    pub kind: EntryKind,
    /// Owning account id (not the account slot).
    pub owner: AccountId,
    /// Logical content length for files; 0 for directories.
    pub size: usize,
    /// Head of the entry's content-block chain. Always equal to the
    /// entry's own slot in this design; doubles as the self-address in
    /// the snapshot format.
    pub address: SlotId,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
    /// Namespace-wide read-only flag. While set, no account may write,
    /// including the lock owner.
    pub locked: bool,
    pub lock_owner: Option<AccountId>,
    /// Parent slot; `None` only for the global root.
    pub parent: Option<SlotId>,
    /// Content buffer; empty and unused for directories.
    pub content: ContentBuffer,
}

impl Entry {
    fn new(
        name: &str,
        kind: EntryKind,
        owner: AccountId,
        parent: Option<SlotId>,
        slot: SlotId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            owner,
            size: 0,
            address: slot,
            created: now,
            modified: now,
            accessed: now,
            locked: false,
            lock_owner: None,
            parent,
            content: ContentBuffer::new(),
        }
    }
}

/// Allocation state of the content-block chain. Kept for format and
/// lifecycle fidelity: every entry's chain is exactly one block (its
/// own slot), so the release walk visits at most one link.
#[derive(Debug, Clone)]
struct BlockChain {
    next: Vec<Option<u32>>,
    used: Vec<bool>,
}

impl BlockChain {
    fn new(capacity: usize) -> Self {
        Self {
            next: vec![None; capacity],
            used: vec![false; capacity],
        }
    }

    fn claim(&mut self, block: usize) {
        self.used[block] = true;
        self.next[block] = None;
    }

    fn release(&mut self, start: usize) {
        let mut block = Some(start as u32);
        while let Some(b) = block {
            let b = b as usize;
            if b >= self.used.len() || !self.used[b] {
                break;
            }
            block = self.next[b];
            self.next[b] = None;
            self.used[b] = false;
        }
    }
}

/// Fixed-capacity table of namespace entries.
#[derive(Debug, Clone)]
pub struct EntryTable {
    slots: Vec<Option<Entry>>,
    blocks: BlockChain,
    /// Monotonically advancing allocation cursor; allocation scans
    /// forward from here and never looks behind it.
    cursor: usize,
}

impl EntryTable {
    /// Create a table holding only the global root at slot 0.
    pub fn new(limits: &Limits) -> Self {
        let mut table = Self {
            slots: vec![None; limits.max_entries],
            blocks: BlockChain::new(limits.max_entries),
            cursor: 1,
        };
        let now = Utc::now();
        table.slots[0] = Some(Entry::new(
            "/",
            EntryKind::Directory,
            AccountId::SYSTEM,
            None,
            SlotId::ROOT,
            now,
        ));
        table.blocks.claim(0);
        table
    }

    /// Rebuild an empty shell for a snapshot load: no entries, cursor
    /// to be restored by the loader.
    pub(crate) fn empty(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            blocks: BlockChain::new(capacity),
            cursor: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn cursor(&self) -> u32 {
        self.cursor as u32
    }

    pub(crate) fn set_cursor(&mut self, cursor: u32) {
        self.cursor = cursor as usize;
    }

    /// Fetch a live entry.
    pub fn get(&self, slot: SlotId) -> Option<&Entry> {
        self.slots.get(slot.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut Entry> {
        self.slots.get_mut(slot.index()).and_then(Option::as_mut)
    }

    /// Place an entry at an explicit slot (snapshot self-addressing).
    pub(crate) fn place(&mut self, slot: SlotId, entry: Entry) -> Result<()> {
        let idx = slot.index();
        if idx >= self.slots.len() {
            return Err(Error::Format(format!(
                "entry slot {slot} outside table of {}",
                self.slots.len()
            )));
        }
        if self.slots[idx].is_some() {
            return Err(Error::Format(format!("duplicate entry slot {slot}")));
        }
        self.blocks.claim(idx);
        self.slots[idx] = Some(entry);
        Ok(())
    }

    /// Linear scan for a live child of `parent` named `name` exactly.
    pub fn lookup_child(&self, parent: SlotId, name: &str) -> Option<SlotId> {
        self.slots.iter().enumerate().find_map(|(i, slot)| {
            let entry = slot.as_ref()?;
            (entry.parent == Some(parent) && entry.name == name).then_some(SlotId(i as u32))
        })
    }

    /// Allocate and initialize a new entry under `parent`.
    ///
    /// Scans forward from the allocation cursor for the first free slot;
    /// fails with `ResourceExhausted` when none exists at or after the
    /// cursor, and with `AlreadyExists` on a live same-named sibling.
    /// No entry is created on any failure path.
    pub fn create(
        &mut self,
        name: &str,
        kind: EntryKind,
        owner: AccountId,
        parent: SlotId,
    ) -> Result<SlotId> {
        if self.lookup_child(parent, name).is_some() {
            return Err(Error::already_exists(name));
        }

        let free = (self.cursor..self.slots.len()).find(|i| self.slots[*i].is_none());
        let Some(idx) = free else {
            return Err(Error::ResourceExhausted(
                "no free entry slot at or after the allocation cursor".into(),
            ));
        };

        let slot = SlotId(idx as u32);
        let now = Utc::now();
        self.slots[idx] = Some(Entry::new(name, kind, owner, Some(parent), slot, now));
        self.blocks.claim(idx);
        self.cursor = idx + 1;
        Ok(slot)
    }

    /// Live direct children of `parent`, in slot order.
    pub fn children(&self, parent: SlotId) -> impl Iterator<Item = (SlotId, &Entry)> {
        self.slots.iter().enumerate().filter_map(move |(i, slot)| {
            let entry = slot.as_ref()?;
            (entry.parent == Some(parent)).then_some((SlotId(i as u32), entry))
        })
    }

    /// Depth-first pre-order walk from `root`: a directory is visited
    /// before its children.
    pub fn tree_walk<F>(&self, root: SlotId, visitor: &mut F)
    where
        F: FnMut(SlotId, &Entry, usize),
    {
        self.walk_inner(root, 0, visitor);
    }

    fn walk_inner<F>(&self, slot: SlotId, depth: usize, visitor: &mut F)
    where
        F: FnMut(SlotId, &Entry, usize),
    {
        let Some(entry) = self.get(slot) else { return };
        visitor(slot, entry, depth);
        if entry.kind.is_dir() {
            let child_slots: Vec<SlotId> = self.children(slot).map(|(id, _)| id).collect();
            for child in child_slots {
                self.walk_inner(child, depth + 1, visitor);
            }
        }
    }

    /// Soft-delete `slot` and, for directories, its subtree.
    ///
    /// Children are collected before any deletion so the sweep never
    /// skips a sibling; each child directory cascades the same way.
    /// The parent's modified timestamp advances. Returns the number of
    /// entries removed. The global root cannot be deleted.
    pub fn delete(&mut self, slot: SlotId) -> Result<usize> {
        if slot == SlotId::ROOT {
            return Err(Error::PermissionDenied(
                "the namespace root cannot be deleted".into(),
            ));
        }
        let Some(entry) = self.get(slot) else {
            return Err(Error::not_found(format!("slot {slot}")));
        };
        let parent = entry.parent;

        let removed = self.delete_subtree(slot);

        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.modified = Utc::now();
        }
        Ok(removed)
    }

    fn delete_subtree(&mut self, slot: SlotId) -> usize {
        let is_dir = match self.get(slot) {
            Some(entry) => entry.kind.is_dir(),
            None => return 0,
        };

        let mut removed = 0;
        if is_dir {
            // Collect-then-delete: never remove while iterating.
            let children: Vec<SlotId> = self.children(slot).map(|(id, _)| id).collect();
            for child in children {
                removed += self.delete_subtree(child);
            }
        }

        if let Some(entry) = self.slots[slot.index()].take() {
            self.blocks.release(entry.address.0 as usize);
            removed += 1;
        }
        removed
    }

    /// Count of live entries.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// All live entries, in slot order.
    pub(crate) fn iter_live(&self) -> impl Iterator<Item = (SlotId, &Entry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (SlotId(i as u32), e)))
    }
}
