//! crates/engine/src/action.rs
//!
//! The sync action variants produced by reconciliation and consumed by the
//! executor.

use std::fmt;

use localdb::StoredHistory;

use crate::node::LocalNode;
use crate::remote_history::RemoteHistoryHandle;

/// One decision of the reconciliation table: what to do for one file key.
///
/// Each variant carries exactly the data its execution needs; the executor
/// dispatches on the tag and performs the side effects.
#[derive(Debug)]
pub enum SyncAction {
    /// Push the local file up: as a fresh base when no remote history
    /// exists, as a delta entry otherwise.
    Upload {
        /// Existing remote history, absent for a first upload.
        remote: Option<RemoteHistoryHandle>,
        /// The local file to upload.
        local: LocalNode,
    },
    /// Materialise the latest remote version locally.
    Download {
        /// Remote history to download from.
        remote: RemoteHistoryHandle,
        /// Stored snapshot to diff against, absent on first download.
        stored: Option<StoredHistory>,
    },
    /// Remove the local file (and, when present, its stored row and cached
    /// signature).
    DeleteLocal {
        /// The local file to remove.
        local: LocalNode,
        /// Stored snapshot, absent when the file was never synced here.
        stored: Option<StoredHistory>,
    },
    /// Propagate a local deletion: tombstone the remote history and drop
    /// the content blob.
    DeleteRemote {
        /// Remote history to tombstone.
        remote: RemoteHistoryHandle,
        /// Stored snapshot to drop.
        stored: StoredHistory,
    },
    /// Adopt the remote history for an identical local file.
    SaveHistory {
        /// Remote history to persist locally.
        remote: RemoteHistoryHandle,
        /// The matching local file, source of the stored timestamps.
        local: LocalNode,
    },
    /// Drop a stored row whose file is gone on both sides.
    DeleteHistory {
        /// Stored snapshot to drop.
        stored: StoredHistory,
    },
    /// Divergent edits; surface the situation without touching anything.
    Conflict {
        /// Remote side of the conflict.
        remote: RemoteHistoryHandle,
        /// Local side of the conflict.
        local: LocalNode,
        /// Stored snapshot, when one exists.
        stored: Option<StoredHistory>,
    },
    /// Nothing to do.
    Nop,
}

impl SyncAction {
    /// Short tag for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::Download { .. } => "download",
            Self::DeleteLocal { .. } => "delete_local",
            Self::DeleteRemote { .. } => "delete_remote",
            Self::SaveHistory { .. } => "save_history",
            Self::DeleteHistory { .. } => "delete_history",
            Self::Conflict { .. } => "conflict",
            Self::Nop => "nop",
        }
    }

    /// The file key the action concerns, when it concerns one.
    #[must_use]
    pub fn file_key(&self) -> Option<&str> {
        match self {
            Self::Upload { local, .. } | Self::SaveHistory { local, .. } => Some(&local.key),
            Self::Download { remote, .. } => Some(&remote.key),
            Self::DeleteLocal { local, .. } => Some(&local.key),
            Self::DeleteRemote { remote, .. } => Some(&remote.key),
            Self::DeleteHistory { stored } => Some(&stored.key),
            Self::Conflict { remote, .. } => Some(&remote.key),
            Self::Nop => None,
        }
    }

    /// Whether this is the do-nothing action.
    #[must_use]
    pub fn is_nop(&self) -> bool {
        matches!(self, Self::Nop)
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file_key() {
            Some(key) => write!(f, "{}({key})", self.kind()),
            None => write!(f, "{}()", self.kind()),
        }
    }
}
