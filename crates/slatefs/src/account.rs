//! Fixed-capacity account table: registration, login, lockout.
//!
//! Accounts are never physically removed. Secrets are stored and
//! compared in clear text — a reproduced design choice of the system
//! being emulated, flagged here rather than hardened.

use chrono::{DateTime, Utc};

use crate::entry::{AccountId, SlotId};
use crate::error::{Error, Result};
use crate::limits::Limits;

/// Consecutive login failures that permanently lock an account. No
/// unlock operation exists.
pub const MAX_LOGIN_FAILURES: u32 = 3;

/// One registered account.
#[derive(Debug, Clone)]
pub struct Account {
    /// Unique identity, from a monotonic counter (not the table slot).
    pub id: AccountId,
    /// Unique login name; also the name of the account's root directory.
    pub name: String,
    /// Clear-text secret (see module docs).
    pub secret: String,
    /// Permanent lockout flag.
    pub locked: bool,
    /// Consecutive failed login attempts; reset on success.
    pub failures: u32,
    /// The account's root directory, a direct child of the global root.
    pub root_dir: SlotId,
    pub created: DateTime<Utc>,
}

/// Fixed-capacity table of accounts.
#[derive(Debug, Clone)]
pub struct AccountTable {
    slots: Vec<Option<Account>>,
    next_id: u32,
}

impl AccountTable {
    pub fn new(limits: &Limits) -> Self {
        Self {
            slots: vec![None; limits.max_accounts],
            next_id: 1,
        }
    }

    pub(crate) fn empty(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            next_id: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn next_id(&self) -> u32 {
        self.next_id
    }

    pub(crate) fn set_next_id(&mut self, next_id: u32) {
        self.next_id = next_id;
    }

    /// Find a live account by name (exact match).
    pub fn find_by_name(&self, name: &str) -> Option<&Account> {
        self.slots
            .iter()
            .flatten()
            .find(|account| account.name == name)
    }

    /// Find a live account by id.
    pub fn find_by_id(&self, id: AccountId) -> Option<&Account> {
        self.slots.iter().flatten().find(|account| account.id == id)
    }

    /// Claim the first free slot for a new account and hand back its
    /// slot index. The caller finishes registration by creating the
    /// root directory and must release the slot if that fails.
    pub(crate) fn claim(&mut self, name: &str, secret: &str) -> Result<usize> {
        if self.find_by_name(name).is_some() {
            return Err(Error::already_exists(name));
        }
        let Some(idx) = self.slots.iter().position(Option::is_none) else {
            return Err(Error::ResourceExhausted("no free account slot".into()));
        };
        let id = AccountId(self.next_id);
        self.next_id += 1;
        self.slots[idx] = Some(Account {
            id,
            name: name.to_owned(),
            secret: secret.to_owned(),
            locked: false,
            failures: 0,
            root_dir: SlotId::ROOT,
            created: Utc::now(),
        });
        Ok(idx)
    }

    /// Roll a failed registration back: the half-claimed slot becomes
    /// free again so no orphaned account survives.
    pub(crate) fn release(&mut self, slot: usize) {
        self.slots[slot] = None;
    }

    pub(crate) fn slot_mut(&mut self, slot: usize) -> Option<&mut Account> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Place an account at an explicit slot (snapshot self-addressing).
    pub(crate) fn place(&mut self, slot: usize, account: Account) -> Result<()> {
        if slot >= self.slots.len() {
            return Err(Error::Format(format!(
                "account slot {slot} outside table of {}",
                self.slots.len()
            )));
        }
        if self.slots[slot].is_some() {
            return Err(Error::Format(format!("duplicate account slot {slot}")));
        }
        self.slots[slot] = Some(account);
        Ok(())
    }

    /// Authenticate an account by name and secret.
    ///
    /// A wrong secret bumps the failure counter; the third consecutive
    /// failure sets the permanent lockout flag. Success resets the
    /// counter.
    pub fn login(&mut self, name: &str, secret: &str) -> Result<AccountId> {
        let account = self
            .slots
            .iter_mut()
            .flatten()
            .find(|account| account.name == name)
            .ok_or_else(|| Error::not_found(name))?;

        if account.locked {
            return Err(Error::Locked(account.name.clone()));
        }
        if account.secret != secret {
            account.failures += 1;
            if account.failures >= MAX_LOGIN_FAILURES {
                account.locked = true;
                return Err(Error::Locked(account.name.clone()));
            }
            return Err(Error::PermissionDenied("wrong secret".into()));
        }
        account.failures = 0;
        Ok(account.id)
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// All live accounts with their slot index, in slot order.
    pub(crate) fn iter_live(&self) -> impl Iterator<Item = (usize, &Account)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|a| (i, a)))
    }
}
