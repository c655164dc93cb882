//! Property-based tests: random operation sequences applied to a live
//! namespace must survive a snapshot round trip with identical
//! observable state, and path resolution must never panic.

use proptest::prelude::*;
use slatefs::{EntryKind, OpenMode, SlateFs, Session};

/// One namespace mutation, applied by name so sequences stay valid
/// regardless of which earlier steps succeeded.
#[derive(Debug, Clone)]
enum Op {
    CreateFile(String),
    CreateDir(String),
    Write(String, Vec<u8>),
    Lock(String),
    Delete(String),
}

mod strategies {
    use super::Op;
    use proptest::prelude::*;

    pub fn name() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z]{1,8}").unwrap()
    }

    pub fn payload() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..200)
    }

    pub fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            name().prop_map(Op::CreateFile),
            name().prop_map(Op::CreateDir),
            (name(), payload()).prop_map(|(n, d)| Op::Write(n, d)),
            name().prop_map(Op::Lock),
            name().prop_map(Op::Delete),
        ]
    }

    pub fn ops() -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(op(), 1..40)
    }
}

fn apply(fs: &SlateFs, session: &mut Session, op: &Op) {
    match op {
        Op::CreateFile(name) => {
            let _ = fs.create(session, session.root, name, EntryKind::File);
        }
        Op::CreateDir(name) => {
            let _ = fs.create(session, session.root, name, EntryKind::Directory);
        }
        Op::Write(name, data) => {
            let Some(slot) = fs.lookup_child(session.root, name) else {
                return;
            };
            let Ok(fd) = fs.open(session, slot, OpenMode::Write) else {
                return;
            };
            let _ = fs.write(session, fd, data, false);
            let _ = fs.close(session, fd);
        }
        Op::Lock(name) => {
            if let Some(slot) = fs.lookup_child(session.root, name) {
                let _ = fs.toggle_lock(session, slot);
            }
        }
        Op::Delete(name) => {
            if let Some(slot) = fs.lookup_child(session.root, name) {
                let _ = fs.delete(session, slot, true);
            }
        }
    }
}

/// Observable state of an account's subtree: every entry with its
/// slot, kind, size, lock state, and full content.
fn observe(fs: &SlateFs, root: slatefs::SlotId) -> Vec<(u32, String, bool, usize, bool, Vec<u8>)> {
    fs.tree(root)
        .unwrap()
        .into_iter()
        .map(|row| {
            let entry = fs.stat(row.slot).unwrap();
            let content = if entry.kind.is_file() {
                fs.export(row.slot).unwrap()
            } else {
                Vec::new()
            };
            (
                row.slot.0,
                row.name,
                entry.kind.is_file(),
                entry.size,
                entry.locked,
                content,
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever sequence of mutations ran, a save and reload yields
    /// the same observable namespace.
    #[test]
    fn snapshot_round_trip_preserves_observable_state(ops in strategies::ops()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fs.img");

        let before = {
            let fs = SlateFs::builder().snapshot_path(&path).build();
            fs.register("alice", "pw").unwrap();
            let mut session = fs.login("alice", "pw").unwrap();
            for op in &ops {
                apply(&fs, &mut session, op);
            }
            fs.save().unwrap();
            observe(&fs, session.root)
        };

        let fs = SlateFs::builder().snapshot_path(&path).build();
        let session = fs.login("alice", "pw").unwrap();
        let after = observe(&fs, session.root);
        prop_assert_eq!(before, after);
    }

    /// Path resolution never panics, whatever the input looks like.
    #[test]
    fn resolve_never_panics(path in ".{0,60}") {
        let fs = SlateFs::new();
        fs.register("alice", "pw").unwrap();
        let session = fs.login("alice", "pw").unwrap();
        let _ = fs.resolve(&session, &path);
    }

    /// Name validation accepts exactly the documented shape and the
    /// table rejects everything else without panicking.
    #[test]
    fn create_with_arbitrary_names_never_panics(name in ".{0,80}") {
        let fs = SlateFs::new();
        fs.register("alice", "pw").unwrap();
        let session = fs.login("alice", "pw").unwrap();
        let _ = fs.create(&session, session.root, &name, EntryKind::File);
    }
}
