//! crates/engine/src/session.rs
//!
//! Per-run configuration bundle shared by every sync component.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use localdb::LocalDb;
use remote::ObjectStore;

use crate::SyncResult;

/// Static configuration resolved before a session starts.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Bucket holding content blobs.
    pub storage_bucket: String,
    /// Bucket holding histories and entry metadata.
    pub internal_bucket: String,
    /// Sub-prefix for sync metadata under the session prefix.
    pub metadata_prefix: String,
    /// Directory caching the signature of each client-materialised entry.
    pub signature_folder: PathBuf,
    /// Delay between scheduled sync passes.
    pub sync_interval: Duration,
}

/// The resolved local root folder, registered in the local database.
#[derive(Clone, Debug)]
pub struct RootFolder {
    /// Database row id, the foreign key of stored histories.
    pub id: i64,
    /// Absolute path of the directory being synchronized.
    pub path: PathBuf,
}

/// Everything a sync pass needs: configuration, resolved root, and the
/// object-store and database handles.
///
/// The worker owns the session; the executor and producer borrow it. No
/// component stashes it in global state.
pub struct Session {
    /// Remote prefix shared by every client syncing this tree.
    pub s3_prefix: String,
    /// The local root being synchronized.
    pub root_folder: RootFolder,
    /// Bucket holding content blobs.
    pub storage_bucket: String,
    /// Bucket holding histories and entry metadata.
    pub internal_bucket: String,
    /// Sub-prefix for sync metadata under the session prefix.
    pub metadata_prefix: String,
    /// Directory caching signatures by entry key.
    pub signature_folder: PathBuf,
    /// Delay between scheduled sync passes.
    pub sync_interval: Duration,
    /// Object-store backend.
    pub store: Arc<dyn ObjectStore>,
    /// Local sync-state database.
    pub db: LocalDb,
}

impl Session {
    /// Creates a session: resolves the root folder, registers it in the
    /// database, and makes sure the signature cache directory exists.
    pub fn create(
        config: SessionConfig,
        s3_prefix: impl Into<String>,
        root_path: &Path,
        store: Arc<dyn ObjectStore>,
        db: LocalDb,
    ) -> SyncResult<Self> {
        if !config.signature_folder.exists() {
            fs::create_dir_all(&config.signature_folder)?;
        }
        let root = root_path.canonicalize()?;
        let root_row = db.root_for_path(&root.to_string_lossy())?;

        Ok(Self {
            s3_prefix: s3_prefix.into(),
            root_folder: RootFolder {
                id: root_row.id,
                path: root,
            },
            storage_bucket: config.storage_bucket,
            internal_bucket: config.internal_bucket,
            metadata_prefix: config.metadata_prefix,
            signature_folder: config.signature_folder,
            sync_interval: config.sync_interval,
            store,
            db,
        })
    }

    /// Object key of a content blob for a root-relative path.
    #[must_use]
    pub fn content_key(&self, path: &str) -> String {
        format!("{}/{}", self.s3_prefix, path)
    }

    /// Listing prefix for all history documents of this session.
    #[must_use]
    pub fn history_prefix(&self) -> String {
        format!("{}/{}/history", self.s3_prefix, self.metadata_prefix)
    }

    /// Object key of the history document for a file key.
    #[must_use]
    pub fn history_key(&self, file_key: &str) -> String {
        format!("{}/{file_key}", self.history_prefix())
    }

    /// Object key of an entry's delta or signature blob.
    #[must_use]
    pub fn entry_blob_key(&self, entry_key: &str, name: &str) -> String {
        format!(
            "{}/{}/entries/{entry_key}/{name}",
            self.s3_prefix, self.metadata_prefix
        )
    }

    /// Local cache path for the signature of an entry.
    #[must_use]
    pub fn signature_cache_path(&self, entry_key: &str) -> PathBuf {
        self.signature_folder.join(entry_key)
    }
}
