//! Path resolution over the entry table.
//!
//! Every session is contained inside its own account's subtree: `/` and
//! a leading `/` anchor at the caller's root directory, never the global
//! root, and `..` at the caller's root stays put instead of ascending.

use crate::entry::{EntryTable, SlotId};
use crate::error::{Error, Result};

/// Resolve `path` against `table`, starting from `cwd` for relative
/// paths and from `root` (the caller's own root directory) for absolute
/// ones. Empty segments and `.` are skipped. Any missing segment aborts
/// with `NotFound`.
pub fn resolve(table: &EntryTable, root: SlotId, cwd: SlotId, path: &str) -> Result<SlotId> {
    if path.is_empty() {
        return Err(Error::not_found("empty path"));
    }

    let mut current = if path.starts_with('/') { root } else { cwd };

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                // Containment: at the caller's root, `..` is a no-op.
                if current == root {
                    continue;
                }
                let entry = table
                    .get(current)
                    .ok_or_else(|| Error::not_found(path))?;
                current = entry.parent.ok_or_else(|| Error::not_found(path))?;
            }
            name => {
                current = table
                    .lookup_child(current, name)
                    .ok_or_else(|| Error::not_found(name))?;
            }
        }
    }

    Ok(current)
}

/// Absolute path of `slot` relative to the caller's root directory.
/// Returns `/` for the root itself; used for the shell prompt.
pub fn absolute_path(table: &EntryTable, root: SlotId, slot: SlotId) -> String {
    let mut parts = Vec::new();
    let mut current = slot;

    while current != root && current != SlotId::ROOT {
        let Some(entry) = table.get(current) else { break };
        parts.push(entry.name.clone());
        match entry.parent {
            Some(parent) => current = parent,
            None => break,
        }
    }

    if parts.is_empty() {
        return "/".to_owned();
    }
    parts.reverse();
    format!("/{}", parts.join("/"))
}
