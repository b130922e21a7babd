//! The event-driven worker loop: scheduled passes, one action at a time,
//! and clean shutdown.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use engine::session::{Session, SessionConfig};
use engine::worker::SyncWorker;
use remote::{MemoryStore, ObjectStore};
use tempfile::TempDir;

fn session_with_interval(store: Arc<MemoryStore>, interval: Duration) -> (TempDir, Session) {
    let dir = TempDir::new().expect("dir");
    let root = dir.path().join("root");
    fs::create_dir_all(&root).expect("create root");
    let session = Session::create(
        SessionConfig {
            storage_bucket: "storage".into(),
            internal_bucket: "internal".into(),
            metadata_prefix: "rsync".into(),
            signature_folder: dir.path().join("signatures"),
            sync_interval: interval,
        },
        "team",
        &root,
        store,
        localdb::LocalDb::open_in_memory().expect("db"),
    )
    .expect("session");
    (dir, session)
}

#[test]
fn run_once_uploads_and_reaches_a_fixed_point() {
    let store = Arc::new(MemoryStore::new());
    let (_dir, session) = session_with_interval(store.clone(), Duration::from_secs(60));
    fs::write(session.root_folder.path.join("a.txt"), b"hello").expect("write");

    let mut worker = SyncWorker::new(session);
    worker.run_once().expect("first pass");

    let key = checksums::hash_path("a.txt");
    assert!(
        store
            .head("internal", &format!("team/rsync/history/{key}"))
            .is_ok(),
        "run_once must publish the history document"
    );

    worker.run_once().expect("second pass");
}

#[test]
fn the_loop_syncs_on_its_interval_and_shuts_down_cleanly() {
    let store = Arc::new(MemoryStore::new());
    let (_dir, session) = session_with_interval(store.clone(), Duration::from_millis(50));
    let root = session.root_folder.path.clone();

    let mut worker = SyncWorker::new(session);
    let handle = worker.handle();
    let join = thread::spawn(move || worker.run());

    // A file dropped into the root is picked up by a scheduled pass.
    fs::write(root.join("late.txt"), b"arrives after startup").expect("write");
    let key = checksums::hash_path("late.txt");
    let deadline = Instant::now() + Duration::from_secs(10);
    let history_key = format!("team/rsync/history/{key}");
    while store.head("internal", &history_key).is_err() {
        assert!(
            Instant::now() < deadline,
            "scheduled sync never picked up the new file"
        );
        thread::sleep(Duration::from_millis(20));
    }

    handle.shutdown();
    join.join().expect("worker thread").expect("clean shutdown");
}
