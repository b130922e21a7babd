//! End-to-end sync scenarios over an in-memory object store.
//!
//! Two simulated clients share one store, each with its own root folder,
//! database, and signature cache. Every scenario drives full passes through
//! the producer and executor and then inspects the store, the filesystem,
//! and the bookkeeping.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use engine::executor::{ActionExecutor, ActionOutcome};
use engine::produce::SyncActionProducer;
use engine::session::{Session, SessionConfig};
use filetime::FileTime;
use history::NodeHistory;
use remote::{MemoryStore, ObjectStore};
use tempfile::TempDir;

const PREFIX: &str = "team";

struct Client {
    _dir: TempDir,
    session: Session,
}

impl Client {
    fn new(store: Arc<MemoryStore>) -> Self {
        let dir = TempDir::new().expect("client dir");
        let root = dir.path().join("root");
        fs::create_dir_all(&root).expect("create root");

        let session = Session::create(
            SessionConfig {
                storage_bucket: "storage".into(),
                internal_bucket: "internal".into(),
                metadata_prefix: "rsync".into(),
                signature_folder: dir.path().join("signatures"),
                sync_interval: Duration::from_secs(10),
            },
            PREFIX,
            &root,
            store,
            localdb::LocalDb::open_in_memory().expect("db"),
        )
        .expect("session");

        Self { _dir: dir, session }
    }

    fn root(&self) -> &Path {
        &self.session.root_folder.path
    }

    /// Runs one full pass; returns the kinds of the non-nop actions in
    /// execution order.
    fn pass(&self) -> Vec<&'static str> {
        let actions = SyncActionProducer::new(&self.session)
            .produce()
            .expect("produce");
        let executor = ActionExecutor::new(&self.session);

        let mut kinds = Vec::new();
        for action in actions {
            if action.is_nop() {
                continue;
            }
            kinds.push(action.kind());
            executor.do_action(action).expect("execute");
        }
        kinds
    }

    /// Like `pass`, but conflicts are collected instead of asserted away.
    fn pass_collecting_conflicts(&self) -> (Vec<&'static str>, Vec<engine::ConflictReport>) {
        let actions = SyncActionProducer::new(&self.session)
            .produce()
            .expect("produce");
        let executor = ActionExecutor::new(&self.session);

        let mut kinds = Vec::new();
        let mut conflicts = Vec::new();
        for action in actions {
            if action.is_nop() {
                continue;
            }
            kinds.push(action.kind());
            match executor.do_action(action).expect("execute") {
                ActionOutcome::Done => {}
                ActionOutcome::Conflict(report) => conflicts.push(report),
            }
        }
        (kinds, conflicts)
    }

    fn write_file(&self, path: &str, content: &[u8]) {
        let full = self.root().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(&full, content).expect("write");
    }

    /// Appends to a file and pushes its mtime forward so the change is
    /// visible at one-second timestamp granularity.
    fn modify_file(&self, path: &str, extra: &[u8], mtime_bump: i64) {
        let full = self.root().join(path);
        let mut content = fs::read(&full).expect("read");
        content.extend_from_slice(extra);
        fs::write(&full, content).expect("write");
        let now = FileTime::now();
        filetime::set_file_mtime(
            &full,
            FileTime::from_unix_time(now.unix_seconds() + mtime_bump, 0),
        )
        .expect("set mtime");
    }

    fn read_file(&self, path: &str) -> Vec<u8> {
        fs::read(self.root().join(path)).expect("read")
    }
}

fn remote_history(store: &MemoryStore, file_path: &str) -> NodeHistory {
    let key = checksums::hash_path(file_path);
    let bytes = store
        .get_bytes("internal", &format!("{PREFIX}/rsync/history/{key}"), None)
        .expect("history document");
    serde_json::from_slice(&bytes).expect("parse history")
}

fn megabyte_payload() -> Vec<u8> {
    (0..1024 * 1024).map(|i| (i % 251) as u8).collect()
}

#[test]
fn fresh_upload_creates_a_base_entry_and_a_stored_row() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(store.clone());
    client.write_file("data.bin", &megabyte_payload());

    assert_eq!(client.pass(), ["upload"]);

    let history = remote_history(&store, "data.bin");
    assert_eq!(history.path, "data.bin");
    assert_eq!(history.entries.len(), 1);
    let entry = &history.entries[0];
    assert!(entry.base_version.is_some());
    assert!(!entry.has_delta);
    assert_eq!(entry.base_size, 1024 * 1024);

    // The content blob is live in the storage bucket.
    let content_info = store
        .head("storage", &format!("{PREFIX}/data.bin"))
        .expect("content blob");
    assert_eq!(content_info.size, 1024 * 1024);

    // Bookkeeping matches the file on disk.
    let stored = client
        .session
        .db
        .get(client.session.root_folder.id, &history.key)
        .expect("db")
        .expect("stored row");
    let metadata = fs::metadata(client.root().join("data.bin")).expect("metadata");
    let mtime = FileTime::from_last_modification_time(&metadata).unix_seconds();
    assert_eq!(stored.local_modified_time, mtime);
    assert_eq!(stored.data, history);
}

#[test]
fn a_second_pass_with_no_changes_is_all_nops() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(store);
    client.write_file("data.bin", &megabyte_payload());

    assert_eq!(client.pass(), ["upload"]);
    assert!(client.pass().is_empty(), "second pass must be pure nops");
}

#[test]
fn appending_re_uploads_as_a_delta_entry() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(store.clone());
    client.write_file("data.bin", &megabyte_payload());
    assert_eq!(client.pass(), ["upload"]);

    client.modify_file("data.bin", b"!", 2);
    assert_eq!(client.pass(), ["upload"]);

    let history = remote_history(&store, "data.bin");
    assert_eq!(history.entries.len(), 2);
    let latest = &history.entries[1];
    assert!(latest.has_delta);
    assert!(latest.base_version.is_none());
    assert!(
        latest.delta_size < 64 * 1024,
        "a one-byte append must travel as a small delta, got {}",
        latest.delta_size
    );

    // The delta blob exists under the new entry's key.
    assert!(
        store
            .head(
                "internal",
                &format!("{PREFIX}/rsync/entries/{}/delta", latest.key)
            )
            .is_ok()
    );

    // Relative to the first version, the diff is exactly the new entry.
    let stored_view = NodeHistory {
        entries: history.entries[..1].to_vec(),
        ..history.clone()
    };
    let diff = history.diff(Some(&stored_view)).expect("diff");
    assert!(!diff.is_absolute);
    assert_eq!(diff.entries, vec![latest.clone()]);
}

#[test]
fn a_fresh_client_downloads_base_plus_deltas_byte_identically() {
    let store = Arc::new(MemoryStore::new());
    let writer = Client::new(store.clone());
    writer.write_file("docs/report.bin", &megabyte_payload());
    assert_eq!(writer.pass(), ["upload"]);
    writer.modify_file("docs/report.bin", b"appended tail", 2);
    assert_eq!(writer.pass(), ["upload"]);

    let reader = Client::new(store);
    assert_eq!(reader.pass(), ["download"]);

    assert_eq!(
        reader.read_file("docs/report.bin"),
        writer.read_file("docs/report.bin"),
        "downloaded bytes must round-trip"
    );
}

#[test]
fn deleting_locally_tombstones_the_remote_history() {
    let store = Arc::new(MemoryStore::new());
    let writer = Client::new(store.clone());
    writer.write_file("gone.bin", b"short lived");
    assert_eq!(writer.pass(), ["upload"]);

    let reader = Client::new(store.clone());
    assert_eq!(reader.pass(), ["download"]);

    fs::remove_file(writer.root().join("gone.bin")).expect("unlink");
    assert_eq!(writer.pass(), ["delete_remote"]);

    let history = remote_history(&store, "gone.bin");
    assert!(history.is_deleted());
    assert!(
        store.head("storage", &format!("{PREFIX}/gone.bin")).is_err(),
        "content blob must be gone"
    );
    assert!(
        writer
            .session
            .db
            .get(writer.session.root_folder.id, &history.key)
            .expect("db")
            .is_none(),
        "stored row must be gone"
    );

    // The tombstone propagates to the other client.
    assert_eq!(reader.pass(), ["delete_local"]);
    assert!(!reader.root().join("gone.bin").exists());
    assert!(reader.pass().is_empty());
}

#[test]
fn divergent_edits_surface_a_conflict_and_change_nothing() {
    let store = Arc::new(MemoryStore::new());
    let alice = Client::new(store.clone());
    alice.write_file("shared.bin", &megabyte_payload());
    assert_eq!(alice.pass(), ["upload"]);

    let bob = Client::new(store.clone());
    assert_eq!(bob.pass(), ["download"]);

    // Both sides edit: Alice syncs hers first.
    alice.modify_file("shared.bin", b"alice wins", 2);
    assert_eq!(alice.pass(), ["upload"]);
    bob.modify_file("shared.bin", b"bob differs", 2);

    let entries_before = remote_history(&store, "shared.bin").entries.len();
    let bob_bytes_before = bob.read_file("shared.bin");

    let (kinds, conflicts) = bob.pass_collecting_conflicts();
    assert_eq!(kinds, ["conflict"]);
    assert_eq!(conflicts.len(), 1);
    let report = &conflicts[0];
    assert_eq!(report.path, "shared.bin");
    assert_ne!(
        report.local_etag, report.remote_etag,
        "a conflict must carry diverging etags"
    );

    // No transfer happened in either direction.
    assert_eq!(
        remote_history(&store, "shared.bin").entries.len(),
        entries_before
    );
    assert_eq!(bob.read_file("shared.bin"), bob_bytes_before);
}

#[test]
fn matching_content_on_an_untracked_file_just_saves_history() {
    let store = Arc::new(MemoryStore::new());
    let alice = Client::new(store.clone());
    alice.write_file("same.bin", b"identical bytes");
    assert_eq!(alice.pass(), ["upload"]);

    // Bob has the same file already but no bookkeeping for it.
    let bob = Client::new(store);
    bob.write_file("same.bin", b"identical bytes");
    assert_eq!(bob.pass(), ["save_history"]);
    assert!(bob.pass().is_empty());
}

#[test]
fn a_dropped_remote_history_cleans_up_the_local_side() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new(store.clone());
    client.write_file("doomed.bin", b"payload");
    assert_eq!(client.pass(), ["upload"]);

    // Another party purged the whole remote prefix.
    let key = checksums::hash_path("doomed.bin");
    store
        .delete("internal", &format!("{PREFIX}/rsync/history/{key}"))
        .expect("drop history");

    assert_eq!(client.pass(), ["delete_local"]);
    assert!(!client.root().join("doomed.bin").exists());
    assert!(client.pass().is_empty());
}

#[test]
fn the_signature_cache_survives_download_and_feeds_the_next_upload() {
    let store = Arc::new(MemoryStore::new());
    let writer = Client::new(store.clone());
    writer.write_file("cached.bin", &megabyte_payload());
    assert_eq!(writer.pass(), ["upload"]);

    let reader = Client::new(store.clone());
    assert_eq!(reader.pass(), ["download"]);

    let history = remote_history(&store, "cached.bin");
    let last_key = &history.entries.last().expect("entry").key;
    assert!(
        reader.session.signature_cache_path(last_key).is_file(),
        "download must cache the signature of the materialised entry"
    );

    // The reader edits and uploads a delta computed from that cache.
    reader.modify_file("cached.bin", b"reader edit", 2);
    assert_eq!(reader.pass(), ["upload"]);
    let history = remote_history(&store, "cached.bin");
    assert_eq!(history.entries.len(), 2);
    assert!(history.entries[1].has_delta);
}
