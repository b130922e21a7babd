//! crates/engine/src/produce.rs
//!
//! One sync pass: gather the three views of every file, join them by key,
//! and decide an action per file.

use std::collections::{HashMap, HashSet};
use std::iter::Peekable;
use std::vec::IntoIter;

use localdb::StoredHistory;
use tracing::{info, warn};

use crate::action::SyncAction;
use crate::node::{LocalNode, scan_local_files};
use crate::reconcile::handle_node;
use crate::remote_history::RemoteHistoryHandle;
use crate::session::Session;
use crate::{SyncError, SyncResult};

/// Produces the batch of actions for one sync pass.
pub struct SyncActionProducer<'a> {
    session: &'a Session,
}

impl<'a> SyncActionProducer<'a> {
    /// Creates a producer borrowing the session.
    #[must_use]
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Lists remote histories, loads stored rows, scans the root folder,
    /// and reconciles the joined triples into actions.
    pub fn produce(&self) -> SyncResult<Vec<SyncAction>> {
        let (remote, stored, skipped) = self.fetch_history()?;

        let mut local = scan_local_files(self.session)?;
        local.sort_by(|a, b| a.key.cmp(&b.key));

        let mut actions = Vec::new();
        for (key, remote, local, stored) in merge_by_key(remote, local, stored) {
            if skipped.contains(&key) {
                continue;
            }
            actions.push(handle_node(remote, local, stored)?);
        }
        info!(count = actions.len(), "sync pass produced actions");
        Ok(actions)
    }

    /// Fetches the remote history listing and the stored rows, loading each
    /// remote body only when its blob ETag moved since the last sync;
    /// otherwise the stored copy is adopted as a cache hit.
    ///
    /// A history that was listed but is gone by the time it is fetched lost
    /// a race with a deleting client; its key is skipped for this pass.
    fn fetch_history(
        &self,
    ) -> SyncResult<(Vec<RemoteHistoryHandle>, Vec<StoredHistory>, HashSet<String>)> {
        let session = self.session;
        let records = session
            .store
            .list_latest_versions(&session.internal_bucket, &session.history_prefix())?;

        let mut remote: Vec<RemoteHistoryHandle> = records
            .iter()
            .filter_map(RemoteHistoryHandle::from_version_record)
            .collect();
        remote.sort_by(|a, b| a.key.cmp(&b.key));

        let stored = session.db.list_by_root(session.root_folder.id)?;
        let stored_by_key: HashMap<&str, &StoredHistory> =
            stored.iter().map(|s| (s.key.as_str(), s)).collect();

        let mut skipped = HashSet::new();
        for handle in &mut remote {
            let cache_hit = stored_by_key
                .get(handle.key.as_str())
                .filter(|s| Some(s.remote_history_etag.as_str()) == handle.etag.as_deref());

            if let Some(stored_row) = cache_hit {
                handle.set_history(stored_row.data.clone());
                continue;
            }
            match handle.load(session) {
                Ok(()) => {}
                Err(SyncError::Remote(remote::RemoteError::NotFound { .. })) => {
                    warn!(
                        key = %handle.key,
                        "history vanished between listing and fetch; skipping this pass"
                    );
                    skipped.insert(handle.key.clone());
                }
                Err(err) => return Err(err),
            }
        }
        remote.retain(|handle| !skipped.contains(&handle.key));

        Ok((remote, stored, skipped))
    }
}

trait Keyed {
    fn sort_key(&self) -> &str;
}

impl Keyed for RemoteHistoryHandle {
    fn sort_key(&self) -> &str {
        &self.key
    }
}

impl Keyed for LocalNode {
    fn sort_key(&self) -> &str {
        &self.key
    }
}

impl Keyed for StoredHistory {
    fn sort_key(&self) -> &str {
        &self.key
    }
}

type Triple = (
    String,
    Option<RemoteHistoryHandle>,
    Option<LocalNode>,
    Option<StoredHistory>,
);

/// Classical three-way merge over key-sorted streams: each step takes the
/// smallest key at any head and pops every stream positioned on it, so each
/// file key yields exactly one triple.
fn merge_by_key(
    remote: Vec<RemoteHistoryHandle>,
    local: Vec<LocalNode>,
    stored: Vec<StoredHistory>,
) -> Vec<Triple> {
    let mut remote = remote.into_iter().peekable();
    let mut local = local.into_iter().peekable();
    let mut stored = stored.into_iter().peekable();

    let mut triples = Vec::new();
    loop {
        let key = [
            remote.peek().map(Keyed::sort_key),
            local.peek().map(Keyed::sort_key),
            stored.peek().map(Keyed::sort_key),
        ]
        .into_iter()
        .flatten()
        .min()
        .map(ToOwned::to_owned);

        let Some(key) = key else {
            break;
        };
        triples.push((
            key.clone(),
            take_if(&mut remote, &key),
            take_if(&mut local, &key),
            take_if(&mut stored, &key),
        ));
    }
    triples
}

fn take_if<T: Keyed>(iter: &mut Peekable<IntoIter<T>>, key: &str) -> Option<T> {
    if iter.peek().is_some_and(|item| item.sort_key() == key) {
        iter.next()
    } else {
        None
    }
}
