//! crates/engine/src/rsync.rs
//!
//! Glue between the pure delta operations and the session: signature cache
//! maintenance, fetching remote signatures and deltas, and chained patching.

use std::fs;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::session::Session;
use crate::transfer::download_metadata;
use crate::{DELTA_BLOB, SIGNATURE_BLOB, SyncResult};

/// Computes the signature of `local_path` into `sig_path` and caches a copy
/// under the entry key, ready for the next delta against this version.
pub fn calc_signature(
    session: &Session,
    local_path: &Path,
    entry_key: &str,
    sig_path: &Path,
) -> SyncResult<()> {
    delta::signature(local_path, sig_path)?;
    fs::copy(sig_path, session.signature_cache_path(entry_key))?;
    Ok(())
}

/// Computes the delta that turns the version signed under `prev_entry_key`
/// into the current `local_path`, preferring the cached signature and
/// falling back to the remote signature blob.
pub fn calc_delta(
    session: &Session,
    local_path: &Path,
    prev_entry_key: &str,
    delta_path: &Path,
) -> SyncResult<()> {
    let cached = session.signature_cache_path(prev_entry_key);
    if cached.exists() {
        delta::delta(&cached, local_path, delta_path)?;
    } else {
        let scratch = NamedTempFile::new()?;
        download_metadata(session, prev_entry_key, SIGNATURE_BLOB, scratch.path())?;
        delta::delta(scratch.path(), local_path, delta_path)?;
    }
    Ok(())
}

/// Applies the deltas of `entry_keys` to `local_path` in order, replacing
/// the file with the final result.
///
/// Each step patches into a scratch file that becomes the base of the next
/// step; the last scratch is renamed over the original, so a failure at any
/// step leaves the original untouched.
pub fn patch_file(session: &Session, local_path: &Path, entry_keys: &[String]) -> SyncResult<()> {
    if entry_keys.is_empty() {
        return Ok(());
    }

    let scratch_dir = local_path
        .parent()
        .unwrap_or(&session.root_folder.path)
        .to_owned();

    let mut current: Option<NamedTempFile> = None;
    for key in entry_keys {
        let base = current
            .as_ref()
            .map_or(local_path, NamedTempFile::path)
            .to_owned();
        let result = NamedTempFile::new_in(&scratch_dir)?;
        apply_delta(session, &base, key, result.path())?;
        current = Some(result);
    }

    let patched = current.expect("entry_keys is non-empty");
    patched
        .persist(local_path)
        .map_err(|err| crate::SyncError::Io(err.error))?;
    Ok(())
}

/// Fetches one entry's delta blob and patches `base_path` into `result_path`.
pub fn apply_delta(
    session: &Session,
    base_path: &Path,
    entry_key: &str,
    result_path: &Path,
) -> SyncResult<()> {
    let scratch = NamedTempFile::new()?;
    download_metadata(session, entry_key, DELTA_BLOB, scratch.path())?;
    delta::patch(base_path, scratch.path(), result_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use localdb::LocalDb;
    use remote::{MemoryStore, ObjectStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_session() -> (tempfile::TempDir, Arc<MemoryStore>, Session) {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let root = dir.path().join("root");
        fs::create_dir_all(&root).expect("create root");
        let store = Arc::new(MemoryStore::new());
        let session = Session::create(
            crate::SessionConfig {
                storage_bucket: "storage".into(),
                internal_bucket: "internal".into(),
                metadata_prefix: "rsync".into(),
                signature_folder: dir.path().join("signatures"),
                sync_interval: Duration::from_secs(10),
            },
            "prefix",
            &root,
            store.clone(),
            LocalDb::open_in_memory().expect("db"),
        )
        .expect("session");
        (dir, store, session)
    }

    #[test]
    fn calc_signature_fills_the_cache() {
        let (dir, _store, session) = test_session();
        let file = session.root_folder.path.join("f.bin");
        fs::write(&file, vec![9u8; 5000]).expect("write");

        let sig = dir.path().join("sig");
        calc_signature(&session, &file, "entry1", &sig).expect("signature");

        assert!(sig.is_file());
        assert_eq!(
            fs::read(&sig).expect("sig"),
            fs::read(session.signature_cache_path("entry1")).expect("cached sig")
        );
    }

    #[test]
    fn calc_delta_falls_back_to_the_remote_signature() {
        let (dir, _store, session) = test_session();
        let base = session.root_folder.path.join("f.bin");
        fs::write(&base, vec![1u8; 10_000]).expect("write base");

        // Sign the base and publish the signature only remotely.
        let sig = dir.path().join("sig");
        delta::signature(&base, &sig).expect("sign");
        crate::transfer::upload_metadata(&session, &sig, "prev", SIGNATURE_BLOB).expect("upload");
        assert!(!session.signature_cache_path("prev").exists());

        let mut updated = fs::read(&base).expect("read");
        updated.extend_from_slice(b"tail");
        let new_file = session.root_folder.path.join("new.bin");
        fs::write(&new_file, &updated).expect("write new");

        let delta_path = dir.path().join("delta");
        calc_delta(&session, &new_file, "prev", &delta_path).expect("delta");

        let out = dir.path().join("out");
        delta::patch(&base, &delta_path, &out).expect("patch");
        assert_eq!(fs::read(&out).expect("read out"), updated);
    }

    #[test]
    fn patch_file_applies_a_chain_of_deltas_in_order() {
        let (dir, _store, session) = test_session();

        let v1 = vec![1u8; 8192];
        let mut v2 = v1.clone();
        v2.extend_from_slice(b"-two");
        let mut v3 = v2.clone();
        v3.extend_from_slice(b"-three");

        // Build delta blobs v1->v2 and v2->v3 and publish them.
        for (from, to, key) in [(&v1, &v2, "e2"), (&v2, &v3, "e3")] {
            let base = dir.path().join(format!("{key}-base"));
            let new = dir.path().join(format!("{key}-new"));
            fs::write(&base, from).expect("write base");
            fs::write(&new, to).expect("write new");
            let sig = dir.path().join(format!("{key}-sig"));
            let dlt = dir.path().join(format!("{key}-delta"));
            delta::signature(&base, &sig).expect("sign");
            delta::delta(&sig, &new, &dlt).expect("delta");
            crate::transfer::upload_metadata(&session, &dlt, key, DELTA_BLOB).expect("upload");
        }

        let local = session.root_folder.path.join("file.bin");
        fs::write(&local, &v1).expect("write local");
        patch_file(&session, &local, &["e2".into(), "e3".into()]).expect("patch chain");
        assert_eq!(fs::read(&local).expect("read"), v3);
    }

    #[test]
    fn patch_file_with_no_entries_is_a_nop() {
        let (_dir, _store, session) = test_session();
        let local = session.root_folder.path.join("file.bin");
        fs::write(&local, b"untouched").expect("write");
        patch_file(&session, &local, &[]).expect("nop patch");
        assert_eq!(fs::read(&local).expect("read"), b"untouched");
    }
}
