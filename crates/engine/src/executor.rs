//! crates/engine/src/executor.rs
//!
//! Executes sync actions: uploads, downloads, deletions, and bookkeeping.
//!
//! Each action performs its side effects in order and aborts on the first
//! failure. Partial remote state (an uploaded blob without a history update)
//! is tolerated; the next pass re-derives the decision and the stray blob is
//! collected out of band.

use std::fs;

use history::{NodeHistory, NodeHistoryEntry};
use localdb::StoredHistory;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::action::SyncAction;
use crate::node::LocalNode;
use crate::remote_history::RemoteHistoryHandle;
use crate::session::Session;
use crate::{rsync, transfer, DELTA_BLOB, SIGNATURE_BLOB, SyncResult};

/// What an executed action amounted to.
#[derive(Debug)]
pub enum ActionOutcome {
    /// Side effects applied (or nothing to do).
    Done,
    /// A conflict was observed and recorded; nothing was changed.
    Conflict(ConflictReport),
}

/// A surfaced conflict: divergent local and remote content for one file.
#[derive(Clone, Debug)]
pub struct ConflictReport {
    /// File key of the conflicted file.
    pub key: String,
    /// Root-relative path of the local side.
    pub path: String,
    /// Content etag of the local file, when it could be computed.
    pub local_etag: Option<String>,
    /// Content etag of the latest remote version, when available.
    pub remote_etag: Option<String>,
}

/// Executes sync actions against the session's store, database, and root.
pub struct ActionExecutor<'a> {
    session: &'a Session,
}

impl<'a> ActionExecutor<'a> {
    /// Creates an executor borrowing the session.
    #[must_use]
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Performs one action's side effects.
    pub fn do_action(&self, action: SyncAction) -> SyncResult<ActionOutcome> {
        match action {
            SyncAction::Upload { remote, local } => self.upload(remote, local)?,
            SyncAction::Download { remote, stored } => self.download(remote, stored)?,
            SyncAction::DeleteLocal { local, stored } => self.delete_local(&local, stored)?,
            SyncAction::DeleteRemote { remote, stored } => self.delete_remote(remote, &stored)?,
            SyncAction::SaveHistory { remote, local } => self.save_history(&remote, &local)?,
            SyncAction::DeleteHistory { stored } => self.delete_history(&stored)?,
            SyncAction::Conflict {
                remote,
                local,
                stored: _,
            } => return Ok(ActionOutcome::Conflict(self.conflict(&remote, &local))),
            SyncAction::Nop => {}
        }
        Ok(ActionOutcome::Done)
    }

    /// Uploads the local file: a delta entry against the previous version
    /// when a remote history exists, a fresh base otherwise.
    fn upload(&self, remote: Option<RemoteHistoryHandle>, local: LocalNode) -> SyncResult<()> {
        let session = self.session;
        let new_key = NodeHistoryEntry::generate_key();
        let local_path = local.local_path();

        let mut remote = match remote {
            Some(mut remote) => {
                let prev_key = remote.history()?.last()?.key.clone();

                let delta_scratch = NamedTempFile::new()?;
                rsync::calc_delta(session, &local_path, &prev_key, delta_scratch.path())?;
                transfer::upload_metadata(session, delta_scratch.path(), &new_key, DELTA_BLOB)?;
                let delta_size = fs::metadata(delta_scratch.path())?.len();

                let sig_scratch = NamedTempFile::new()?;
                rsync::calc_signature(session, &local_path, &new_key, sig_scratch.path())?;
                transfer::upload_metadata(session, sig_scratch.path(), &new_key, SIGNATURE_BLOB)?;

                remote.history_mut()?.add_entry(NodeHistoryEntry::create_delta_only(
                    new_key,
                    local.calc_etag()?,
                    delta_size,
                ));
                remote
            }
            None => {
                let sig_scratch = NamedTempFile::new()?;
                rsync::calc_signature(session, &local_path, &new_key, sig_scratch.path())?;
                transfer::upload_metadata(session, sig_scratch.path(), &new_key, SIGNATURE_BLOB)?;

                let version = transfer::upload_to_root(session, &local)?;

                let mut history = NodeHistory::create(local.path.clone(), Vec::new());
                history.add_entry(NodeHistoryEntry::create_base_only(
                    new_key,
                    local.calc_etag()?,
                    version,
                    local.size,
                ));
                RemoteHistoryHandle::for_new_upload(local.key.clone(), history)
            }
        };

        let remote_etag = remote.save(session)?;
        session.db.upsert(&StoredHistory {
            key: remote.key.clone(),
            root_folder_id: session.root_folder.id,
            data: remote.history()?.clone(),
            local_modified_time: local.modified_time,
            local_created_time: local.created_time,
            remote_history_etag: remote_etag,
        })?;
        debug!(key = %remote.key, "upload complete");
        Ok(())
    }

    /// Materialises the latest remote version: a fresh base plus replayed
    /// deltas, or deltas against the already-synced local file, whichever
    /// the history diff says moves fewer bytes.
    fn download(
        &self,
        remote: RemoteHistoryHandle,
        stored: Option<StoredHistory>,
    ) -> SyncResult<()> {
        let session = self.session;
        let history = remote.history()?.clone();
        let diff = history.diff(stored.as_ref().map(|s| &s.data))?;

        let (local_path, to_patch) = if diff.is_absolute {
            let first = diff
                .entries
                .first()
                .and_then(|e| e.base_version.as_deref())
                .ok_or_else(|| history::HistoryError::NoReachableBase {
                    key: history.key.clone(),
                })?;
            let path = transfer::download_to_root(session, &history.path, Some(first))?;
            (path, &diff.entries[1..])
        } else {
            (
                session.root_folder.path.join(&history.path),
                &diff.entries[..],
            )
        };

        if !to_patch.is_empty() {
            let keys: Vec<String> = to_patch.iter().map(|e| e.key.clone()).collect();
            rsync::patch_file(session, &local_path, &keys)?;
        }

        // Cache the signature of the entry now materialised, so the next
        // upload can compute its delta without a round trip.
        if let Some(last_entry) = diff.entries.last() {
            transfer::download_metadata(
                session,
                &last_entry.key,
                SIGNATURE_BLOB,
                &session.signature_cache_path(&last_entry.key),
            )?;
        }

        let node = LocalNode::create(&local_path, session)?;
        let remote_etag = remote.etag.clone().unwrap_or_default();
        session.db.upsert(&StoredHistory {
            key: remote.key.clone(),
            root_folder_id: session.root_folder.id,
            data: history,
            local_modified_time: node.modified_time,
            local_created_time: node.created_time,
            remote_history_etag: remote_etag,
        })?;
        debug!(key = %remote.key, "download complete");
        Ok(())
    }

    /// Removes the local file, its cached signature, and the stored row.
    fn delete_local(&self, local: &LocalNode, stored: Option<StoredHistory>) -> SyncResult<()> {
        fs::remove_file(local.local_path())?;
        if let Some(stored) = stored {
            if let Ok(last) = stored.data.last() {
                remove_cached_signature(self.session, &last.key);
            }
            self.session
                .db
                .delete(stored.root_folder_id, &stored.key)?;
        }
        debug!(key = %local.key, "local file removed");
        Ok(())
    }

    /// Propagates a local deletion: drops the content blob, appends a
    /// tombstone to the remote history, and clears the local bookkeeping.
    fn delete_remote(
        &self,
        mut remote: RemoteHistoryHandle,
        stored: &StoredHistory,
    ) -> SyncResult<()> {
        let session = self.session;
        let last_key = remote.history()?.last()?.key.clone();
        let path = remote.history()?.path.clone();

        remove_cached_signature(session, &last_key);
        session
            .store
            .delete(&session.storage_bucket, &session.content_key(&path))?;

        remote.history_mut()?.add_delete_marker();
        remote.save(session)?;
        session.db.delete(stored.root_folder_id, &stored.key)?;
        debug!(key = %remote.key, "remote file tombstoned");
        Ok(())
    }

    /// Persists the remote history for a local file whose content already
    /// matches it.
    fn save_history(&self, remote: &RemoteHistoryHandle, local: &LocalNode) -> SyncResult<()> {
        let remote_etag = remote.etag.clone().unwrap_or_default();
        self.session.db.upsert(&StoredHistory {
            key: remote.key.clone(),
            root_folder_id: self.session.root_folder.id,
            data: remote.history()?.clone(),
            local_modified_time: local.modified_time,
            local_created_time: local.created_time,
            remote_history_etag: remote_etag,
        })?;
        Ok(())
    }

    /// Drops the stored row.
    fn delete_history(&self, stored: &StoredHistory) -> SyncResult<()> {
        self.session.db.delete(stored.root_folder_id, &stored.key)?;
        Ok(())
    }

    /// Records a conflict without mutating anything.
    fn conflict(&self, remote: &RemoteHistoryHandle, local: &LocalNode) -> ConflictReport {
        let report = ConflictReport {
            key: remote.key.clone(),
            path: local.path.clone(),
            local_etag: local.calc_etag().ok(),
            remote_etag: remote
                .history()
                .ok()
                .and_then(|h| h.etag().ok())
                .map(ToOwned::to_owned),
        };
        warn!(
            key = %report.key,
            path = %report.path,
            local_etag = report.local_etag.as_deref().unwrap_or("?"),
            remote_etag = report.remote_etag.as_deref().unwrap_or("?"),
            "conflicting local and remote edits; leaving both sides untouched"
        );
        report
    }
}

/// Drops a cached signature; a missing cache entry is normal on a client
/// that never materialised the version.
fn remove_cached_signature(session: &Session, entry_key: &str) {
    let path = session.signature_cache_path(entry_key);
    if let Err(err) = fs::remove_file(&path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to drop cached signature");
        }
    }
}
