//! crates/engine/src/rebuild.rs
//!
//! Full-version rebuild: collapse the final delta of a chain into a fresh
//! base so future downloads start from a recent full copy.

use std::fs;

use tempfile::NamedTempFile;
use tracing::info;

use crate::node::LocalNode;
use crate::remote_history::RemoteHistoryHandle;
use crate::rsync::apply_delta;
use crate::session::Session;
use crate::{SyncError, SyncResult};

/// Rebuilds a full base for the latest version of the file at `local_path`.
///
/// The history's last entry must be delta-only and the one before it must
/// carry a base. The previous base is downloaded, the final delta applied,
/// the result uploaded as a new content version, and the last entry promoted
/// to the "whole" shape with the new `base_version` and `base_size`.
pub fn create_full_version(session: &Session, local_path: &std::path::Path) -> SyncResult<()> {
    let node = LocalNode::create(local_path, session)?;
    let mut remote = RemoteHistoryHandle::for_key(node.key.clone());
    remote.load(session)?;

    let history = remote.history()?;
    let last = history.last()?.clone();
    let previous = history
        .entries
        .iter()
        .rev()
        .nth(1)
        .cloned()
        .ok_or_else(|| SyncError::RebuildUnsupported {
            key: history.key.clone(),
            reason: "the chain has a single entry".to_owned(),
        })?;

    if last.base_version.is_some() || !last.has_delta {
        return Err(SyncError::RebuildUnsupported {
            key: history.key.clone(),
            reason: "the last entry already carries a base".to_owned(),
        });
    }
    if previous.base_version.is_none() {
        return Err(SyncError::RebuildUnsupported {
            key: history.key.clone(),
            reason: "the previous entry has no base to start from".to_owned(),
        });
    }

    let content_key = session.content_key(&remote.history()?.path);

    // Materialise the previous base, replay the final delta onto it.
    let base_scratch = NamedTempFile::new()?;
    session.store.get(
        &session.storage_bucket,
        &content_key,
        base_scratch.path(),
        previous.base_version.as_deref(),
    )?;
    let rebuilt = NamedTempFile::new()?;
    apply_delta(session, base_scratch.path(), &last.key, rebuilt.path())?;

    let put = session
        .store
        .put(&session.storage_bucket, &content_key, rebuilt.path())?;
    let version_id = put.version_id.ok_or_else(|| {
        SyncError::Remote(remote::RemoteError::MissingVersionId {
            bucket: session.storage_bucket.clone(),
            key: content_key,
        })
    })?;
    let base_size = fs::metadata(rebuilt.path())?.len();

    let entry = remote
        .history_mut()?
        .entries
        .last_mut()
        .expect("chain verified non-empty above");
    entry.attach_base(version_id, base_size);
    remote.save(session)?;

    info!(key = %remote.key, "rebuilt a full base for the latest version");
    Ok(())
}
