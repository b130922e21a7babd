//! crates/engine/src/remote_history.rs
//!
//! Handle to a remote history document through its listed -> loaded ->
//! saved lifecycle.

use history::NodeHistory;
use remote::VersionRecord;

use crate::session::Session;
use crate::{SyncError, SyncResult};

/// In-memory wrapper around one history document in the internal bucket.
///
/// A handle starts `listed` (key and blob ETag known, body absent), becomes
/// `loaded` once [`load`](Self::load) fetches and parses the body, and is
/// `saved` after [`save`](Self::save) wrote the body back and refreshed the
/// ETag. Saving requires a loaded body; using the body earlier is an
/// invariant error.
#[derive(Clone, Debug)]
pub struct RemoteHistoryHandle {
    /// File key, the trailing component of the history object key.
    pub key: String,
    /// Object-store ETag of the history blob as last observed. Distinct
    /// from the content etag inside the document.
    pub etag: Option<String>,
    history: Option<NodeHistory>,
}

impl RemoteHistoryHandle {
    /// Creates a `listed` handle from one latest-version record of the
    /// history prefix.
    #[must_use]
    pub fn from_version_record(record: &VersionRecord) -> Option<Self> {
        let trailing = record.key.rsplit('/').next()?;
        let key = trailing.split('.').next()?.to_owned();
        if key.is_empty() {
            return None;
        }
        Some(Self {
            key,
            etag: Some(record.etag.clone()),
            history: None,
        })
    }

    /// Creates a `loaded` handle for a history that does not exist remotely
    /// yet; its first [`save`](Self::save) creates the document.
    #[must_use]
    pub fn for_new_upload(key: String, history: NodeHistory) -> Self {
        Self {
            key,
            etag: None,
            history: Some(history),
        }
    }

    /// Creates a `listed` handle for a known key, used when a single
    /// document is addressed directly rather than via a listing.
    #[must_use]
    pub fn for_key(key: String) -> Self {
        Self {
            key,
            etag: None,
            history: None,
        }
    }

    /// Fetches and parses the document body, refreshing the blob ETag.
    pub fn load(&mut self, session: &Session) -> SyncResult<()> {
        let object_key = session.history_key(&self.key);
        let info = session.store.head(&session.internal_bucket, &object_key)?;
        let bytes = session
            .store
            .get_bytes(&session.internal_bucket, &object_key, None)?;
        self.history = Some(serde_json::from_slice(&bytes)?);
        self.etag = info.etag;
        Ok(())
    }

    /// Adopts a body without a fetch; used when the stored snapshot is
    /// known to match the listed ETag.
    pub fn set_history(&mut self, history: NodeHistory) {
        self.history = Some(history);
    }

    /// The loaded document.
    pub fn history(&self) -> SyncResult<&NodeHistory> {
        self.history.as_ref().ok_or_else(|| SyncError::HistoryNotLoaded {
            key: self.key.clone(),
        })
    }

    /// Mutable access to the loaded document.
    pub fn history_mut(&mut self) -> SyncResult<&mut NodeHistory> {
        let key = self.key.clone();
        self.history
            .as_mut()
            .ok_or(SyncError::HistoryNotLoaded { key })
    }

    /// Whether the loaded document ends in a delete marker.
    pub fn is_deleted(&self) -> SyncResult<bool> {
        Ok(self.history()?.is_deleted())
    }

    /// Whether the remote document changed since `stored` was written.
    #[must_use]
    pub fn updated(&self, stored: &localdb::StoredHistory) -> bool {
        self.etag.as_deref() != Some(stored.remote_history_etag.as_str())
    }

    /// Writes the document back to the internal bucket and refreshes the
    /// ETag. The put is conditional on the previously observed ETag so a
    /// concurrent writer surfaces as a failed action instead of a lost
    /// update; a handle that never saw an ETag creates the document
    /// unconditionally.
    pub fn save(&mut self, session: &Session) -> SyncResult<String> {
        let body = serde_json::to_vec(self.history()?)?;
        let object_key = session.history_key(&self.key);
        let result = session.store.put_bytes_if_match(
            &session.internal_bucket,
            &object_key,
            &body,
            self.etag.as_deref(),
        )?;

        let etag = match result.etag {
            Some(etag) => etag,
            None => session
                .store
                .head(&session.internal_bucket, &object_key)?
                .etag
                .unwrap_or_default(),
        };
        self.etag = Some(etag.clone());
        Ok(etag)
    }
}
