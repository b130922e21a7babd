//! crates/engine/src/transfer.rs
//!
//! Moving content and metadata blobs between the object store and the root
//! folder, always through scratch files.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::node::LocalNode;
use crate::session::Session;
use crate::{SyncError, SyncResult};

/// Downloads a content blob (optionally at a pinned version) and moves it
/// into place under the root folder, replacing any file already there.
///
/// The scratch file lives inside the root folder so the final rename stays
/// on one filesystem and lands atomically.
pub fn download_to_root(
    session: &Session,
    path: &str,
    version: Option<&str>,
) -> SyncResult<PathBuf> {
    let target = session.root_folder.path.join(path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let scratch = NamedTempFile::new_in(&session.root_folder.path)?;
    session.store.get(
        &session.storage_bucket,
        &session.content_key(path),
        scratch.path(),
        version,
    )?;
    scratch
        .persist(&target)
        .map_err(|err| SyncError::Io(err.error))?;
    Ok(target)
}

/// Uploads a local file as a new content version and returns the version id
/// the bucket assigned.
///
/// The file is copied to a scratch location first so a writer touching it
/// mid-action cannot tear the uploaded bytes.
pub fn upload_to_root(session: &Session, node: &LocalNode) -> SyncResult<String> {
    let scratch = NamedTempFile::new()?;
    fs::copy(node.local_path(), scratch.path())?;

    let object_key = session.content_key(&node.path);
    let result = session
        .store
        .put(&session.storage_bucket, &object_key, scratch.path())?;

    let version_id = match result.version_id {
        Some(version_id) => Some(version_id),
        None => {
            session
                .store
                .head(&session.storage_bucket, &object_key)?
                .version_id
        }
    };
    version_id.ok_or_else(|| {
        SyncError::Remote(remote::RemoteError::MissingVersionId {
            bucket: session.storage_bucket.clone(),
            key: object_key,
        })
    })
}

/// Uploads an entry's delta or signature blob.
pub fn upload_metadata(
    session: &Session,
    local_path: &Path,
    entry_key: &str,
    name: &str,
) -> SyncResult<()> {
    session.store.put(
        &session.internal_bucket,
        &session.entry_blob_key(entry_key, name),
        local_path,
    )?;
    Ok(())
}

/// Downloads an entry's delta or signature blob to `dest`.
pub fn download_metadata(
    session: &Session,
    entry_key: &str,
    name: &str,
    dest: &Path,
) -> SyncResult<()> {
    session.store.get(
        &session.internal_bucket,
        &session.entry_blob_key(entry_key, name),
        dest,
        None,
    )?;
    Ok(())
}
