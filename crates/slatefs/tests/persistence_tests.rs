//! Tests for snapshot save/load through the builder: full round trips,
//! corrupt images, and the immediate flush after registration.

use pretty_assertions::assert_eq;
use slatefs::{EntryKind, OpenMode, PersistState, SlateFs};

fn on_disk(path: &std::path::Path) -> SlateFs {
    SlateFs::builder().snapshot_path(path).build()
}

/// A populated namespace survives a save and reload byte-for-byte:
/// accounts, directories, content, locks, and slot numbers.
#[test]
fn namespace_round_trips_through_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fs.img");

    let (file_slot, dir_slot) = {
        let fs = on_disk(&path);
        fs.register("alice", "pw").unwrap();
        let mut session = fs.login("alice", "pw").unwrap();
        let dir_slot = fs
            .create(&session, session.root, "docs", EntryKind::Directory)
            .unwrap();
        let file_slot = fs.create(&session, dir_slot, "a.txt", EntryKind::File).unwrap();
        let fd = fs.open(&mut session, file_slot, OpenMode::Write).unwrap();
        fs.write(&mut session, fd, b"line one\nline two\n", false)
            .unwrap();
        fs.close(&mut session, fd).unwrap();
        fs.toggle_lock(&session, file_slot).unwrap();
        fs.save().unwrap();
        assert_eq!(fs.persist_state(), PersistState::Saved);
        (file_slot, dir_slot)
    };

    let fs = on_disk(&path);
    let session = fs.login("alice", "pw").unwrap();
    assert_eq!(fs.resolve(&session, "docs").unwrap(), dir_slot);
    assert_eq!(fs.resolve(&session, "docs/a.txt").unwrap(), file_slot);

    let entry = fs.stat(file_slot).unwrap();
    assert!(entry.locked);
    assert_eq!(entry.lock_owner, Some(session.account));
    assert_eq!(entry.size, 18);
    assert_eq!(fs.export(file_slot).unwrap(), b"line one\nline two\n");
}

/// Registration flushes the snapshot on its own; no explicit save is
/// needed for a new account to survive a restart.
#[test]
fn registration_is_flushed_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fs.img");

    {
        let fs = on_disk(&path);
        fs.register("alice", "pw").unwrap();
        // No save() here.
    }

    let fs = on_disk(&path);
    assert!(fs.login("alice", "pw").is_ok());
}

/// Mutations after the flush are lost without a save; the image stays
/// at the registration state.
#[test]
fn unsaved_mutations_do_not_survive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fs.img");

    {
        let fs = on_disk(&path);
        fs.register("alice", "pw").unwrap();
        let session = fs.login("alice", "pw").unwrap();
        fs.create(&session, session.root, "ghost", EntryKind::File)
            .unwrap();
        assert!(fs.is_dirty());
    }

    let fs = on_disk(&path);
    let session = fs.login("alice", "pw").unwrap();
    assert!(fs.lookup_child(session.root, "ghost").is_none());
}

/// Secrets big enough to overflow the snapshot's string length prefix
/// are rejected at registration, and the longest accepted secret
/// round-trips cleanly, so no account can poison the image.
#[test]
fn extreme_secrets_cannot_corrupt_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fs.img");
    let longest = "s".repeat(slatefs::MAX_SECRET_LEN);

    {
        let fs = on_disk(&path);
        assert!(matches!(
            fs.register("mallory", &"s".repeat(70_000)),
            Err(slatefs::Error::InvalidArgument(_))
        ));
        fs.register("alice", &longest).unwrap();
        fs.save().unwrap();
    }

    let fs = on_disk(&path);
    assert!(fs.login("alice", &longest).is_ok());
    assert!(matches!(
        fs.login("mallory", "anything"),
        Err(slatefs::Error::NotFound(_))
    ));
}

/// Login failure counters persist, so the lockout cannot be reset by
/// restarting the process.
#[test]
fn failure_counters_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fs.img");

    {
        let fs = on_disk(&path);
        fs.register("alice", "pw").unwrap();
        assert!(fs.login("alice", "bad").is_err());
        assert!(fs.login("alice", "bad").is_err());
        fs.save().unwrap();
    }

    let fs = on_disk(&path);
    assert!(matches!(
        fs.login("alice", "bad"),
        Err(slatefs::Error::Locked(_))
    ));
}

/// A corrupt snapshot file degrades to a fresh namespace instead of
/// refusing to start.
#[test]
fn corrupt_snapshot_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fs.img");
    std::fs::write(&path, b"garbage bytes").unwrap();

    let fs = on_disk(&path);
    assert_eq!(fs.persist_state(), PersistState::Loaded);
    assert!(matches!(
        fs.login("alice", "pw"),
        Err(slatefs::Error::NotFound(_))
    ));
    // The fresh instance is fully usable.
    fs.register("alice", "pw").unwrap();
    assert!(fs.login("alice", "pw").is_ok());
}

/// A snapshot with a flipped version field is rejected as a whole.
#[test]
fn wrong_version_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fs.img");

    {
        let fs = on_disk(&path);
        fs.register("alice", "pw").unwrap();
        fs.save().unwrap();
    }
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[8..12].copy_from_slice(&7u32.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let fs = on_disk(&path);
    assert!(fs.login("alice", "pw").is_err());
}

/// Deleted entries are gone from the image and their slots stay
/// retired after a reload.
#[test]
fn deletions_and_the_cursor_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fs.img");

    let old_slot = {
        let fs = on_disk(&path);
        fs.register("alice", "pw").unwrap();
        let session = fs.login("alice", "pw").unwrap();
        let slot = fs
            .create(&session, session.root, "gone", EntryKind::File)
            .unwrap();
        fs.delete(&session, slot, false).unwrap();
        fs.save().unwrap();
        slot
    };

    let fs = on_disk(&path);
    let session = fs.login("alice", "pw").unwrap();
    assert!(fs.stat(old_slot).is_err());
    let replacement = fs
        .create(&session, session.root, "next", EntryKind::File)
        .unwrap();
    assert!(replacement.0 > old_slot.0);
}
