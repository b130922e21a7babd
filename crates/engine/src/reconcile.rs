//! crates/engine/src/reconcile.rs
//!
//! The three-way reconciliation table: remote history, local file, stored
//! snapshot in, one sync action out.

use localdb::StoredHistory;

use crate::action::SyncAction;
use crate::node::LocalNode;
use crate::remote_history::RemoteHistoryHandle;
use crate::SyncResult;

/// Decides the sync action for one file key.
///
/// "Updated" means: for the local file, either timestamp differs from the
/// stored row; for the remote history, the blob ETag differs from the one
/// the stored row observed. A remote whose chain ends in a tombstone counts
/// as deleted, not as existing.
///
/// Every combination of presence and updatedness maps to exactly one action;
/// the only failures this function can surface are etag computation on the
/// local file and use of an unloaded remote handle.
pub fn handle_node(
    remote: Option<RemoteHistoryHandle>,
    local: Option<LocalNode>,
    stored: Option<StoredHistory>,
) -> SyncResult<SyncAction> {
    Ok(match (remote, local, stored) {
        // Nothing anywhere.
        (None, None, None) => SyncAction::Nop,

        // Only a stale stored row survives.
        (None, None, Some(stored)) => SyncAction::DeleteHistory { stored },

        // Brand-new local file.
        (None, Some(local), None) => SyncAction::Upload {
            remote: None,
            local,
        },

        // The remote history vanished entirely; another client purged it.
        (None, Some(local), Some(stored)) => SyncAction::DeleteLocal {
            local,
            stored: Some(stored),
        },

        (Some(remote), None, None) => {
            if remote.is_deleted()? {
                SyncAction::Nop
            } else {
                SyncAction::Download {
                    remote,
                    stored: None,
                }
            }
        }

        (Some(remote), None, Some(stored)) => {
            if remote.is_deleted()? {
                SyncAction::DeleteHistory { stored }
            } else {
                // The file was synced here before and is now gone locally:
                // treat the local removal as deletion intent.
                SyncAction::DeleteRemote { remote, stored }
            }
        }

        (Some(remote), Some(local), None) => {
            if remote.is_deleted()? {
                SyncAction::DeleteLocal {
                    local,
                    stored: None,
                }
            } else if remote.history()?.etag()? == local.calc_etag()? {
                // Same content on both sides; only the bookkeeping is
                // missing.
                SyncAction::SaveHistory { remote, local }
            } else {
                SyncAction::Conflict {
                    remote,
                    local,
                    stored: None,
                }
            }
        }

        (Some(remote), Some(local), Some(stored)) => {
            let local_updated = local.updated(&stored);
            let remote_updated = remote.updated(&stored);

            if remote.is_deleted()? {
                if local_updated {
                    SyncAction::Conflict {
                        remote,
                        local,
                        stored: Some(stored),
                    }
                } else {
                    SyncAction::DeleteLocal {
                        local,
                        stored: Some(stored),
                    }
                }
            } else if local_updated && remote_updated {
                if remote.history()?.etag()? == local.calc_etag()? {
                    SyncAction::Nop
                } else {
                    SyncAction::Conflict {
                        remote,
                        local,
                        stored: Some(stored),
                    }
                }
            } else if local_updated {
                SyncAction::Upload {
                    remote: Some(remote),
                    local,
                }
            } else if remote_updated {
                SyncAction::Download {
                    remote,
                    stored: Some(stored),
                }
            } else {
                SyncAction::Nop
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use history::{NodeHistory, NodeHistoryEntry};
    use std::path::PathBuf;

    /// One file's consistent identity across the three views, with knobs
    /// for divergence.
    struct Fixture {
        path: String,
        content_etag: String,
        history_etag: String,
        modified_time: i64,
        created_time: i64,
    }

    impl Fixture {
        fn new(n: u32) -> Self {
            Self {
                path: format!("dir/file-{n}.dat"),
                content_etag: format!("content-etag-{n}"),
                history_etag: format!("history-etag-{n}"),
                modified_time: 1_700_000_000 + i64::from(n),
                created_time: 1_600_000_000 + i64::from(n),
            }
        }

        fn history(&self, deleted: bool) -> NodeHistory {
            let mut history = NodeHistory::create(
                self.path.clone(),
                vec![NodeHistoryEntry::create_base_only(
                    NodeHistoryEntry::generate_key(),
                    self.content_etag.clone(),
                    "v1".into(),
                    100,
                )],
            );
            if deleted {
                history.add_delete_marker();
            }
            history
        }

        fn remote(&self) -> RemoteHistoryHandle {
            self.remote_with(false, &self.history_etag)
        }

        fn remote_deleted(&self) -> RemoteHistoryHandle {
            self.remote_with(true, &self.history_etag)
        }

        fn remote_with(&self, deleted: bool, blob_etag: &str) -> RemoteHistoryHandle {
            let history = self.history(deleted);
            let mut handle = RemoteHistoryHandle::for_new_upload(history.key.clone(), history);
            handle.etag = Some(blob_etag.to_owned());
            handle
        }

        fn local(&self) -> LocalNode {
            self.local_with(self.modified_time, &self.content_etag)
        }

        fn local_with(&self, modified_time: i64, etag: &str) -> LocalNode {
            let node = LocalNode::for_tests(
                PathBuf::from("/sync/root"),
                &self.path,
                modified_time,
                self.created_time,
                100,
            );
            node.set_etag_for_tests(etag);
            node
        }

        fn stored(&self) -> StoredHistory {
            StoredHistory {
                key: checksums::hash_path(&self.path),
                root_folder_id: 1,
                data: self.history(false),
                local_modified_time: self.modified_time,
                local_created_time: self.created_time,
                remote_history_etag: self.history_etag.clone(),
            }
        }
    }

    fn decide(
        remote: Option<RemoteHistoryHandle>,
        local: Option<LocalNode>,
        stored: Option<StoredHistory>,
    ) -> SyncAction {
        handle_node(remote, local, stored).expect("decision")
    }

    #[test]
    fn nothing_anywhere_is_a_nop() {
        assert!(decide(None, None, None).is_nop());
    }

    #[test]
    fn lone_stored_row_is_dropped() {
        let f = Fixture::new(2);
        let action = decide(None, None, Some(f.stored()));
        assert!(matches!(action, SyncAction::DeleteHistory { .. }));
    }

    #[test]
    fn fresh_local_file_uploads_without_remote() {
        let f = Fixture::new(3);
        let action = decide(None, Some(f.local()), None);
        assert!(matches!(action, SyncAction::Upload { remote: None, .. }));
    }

    #[test]
    fn vanished_remote_history_deletes_the_local_file() {
        let f = Fixture::new(4);
        let action = decide(None, Some(f.local()), Some(f.stored()));
        assert!(matches!(
            action,
            SyncAction::DeleteLocal { stored: Some(_), .. }
        ));
    }

    #[test]
    fn unseen_remote_file_downloads_from_scratch() {
        let f = Fixture::new(5);
        let action = decide(Some(f.remote()), None, None);
        assert!(matches!(action, SyncAction::Download { stored: None, .. }));
    }

    #[test]
    fn locally_removed_file_propagates_the_deletion() {
        let f = Fixture::new(6);
        let action = decide(Some(f.remote()), None, Some(f.stored()));
        assert!(matches!(action, SyncAction::DeleteRemote { .. }));
    }

    #[test]
    fn matching_content_without_bookkeeping_saves_history() {
        let f = Fixture::new(7);
        let action = decide(Some(f.remote()), Some(f.local()), None);
        assert!(matches!(action, SyncAction::SaveHistory { .. }));
    }

    #[test]
    fn differing_content_without_bookkeeping_is_a_conflict() {
        let f = Fixture::new(8);
        let local = f.local_with(f.modified_time, "other-content-etag");
        let action = decide(Some(f.remote()), Some(local), None);
        assert!(matches!(action, SyncAction::Conflict { stored: None, .. }));
    }

    #[test]
    fn unchanged_everywhere_is_a_nop() {
        let f = Fixture::new(9);
        let action = decide(Some(f.remote()), Some(f.local()), Some(f.stored()));
        assert!(action.is_nop());
    }

    #[test]
    fn local_change_alone_uploads_a_delta() {
        let f = Fixture::new(10);
        let local = f.local_with(f.modified_time + 60, &f.content_etag);
        let action = decide(Some(f.remote()), Some(local), Some(f.stored()));
        assert!(matches!(action, SyncAction::Upload { remote: Some(_), .. }));
    }

    #[test]
    fn remote_change_alone_downloads() {
        let f = Fixture::new(11);
        let remote = f.remote_with(false, "newer-history-etag");
        let action = decide(Some(remote), Some(f.local()), Some(f.stored()));
        assert!(matches!(
            action,
            SyncAction::Download { stored: Some(_), .. }
        ));
    }

    #[test]
    fn both_changed_to_identical_content_is_a_nop() {
        let f = Fixture::new(12);
        let remote = f.remote_with(false, "newer-history-etag");
        let local = f.local_with(f.modified_time + 60, &f.content_etag);
        let action = decide(Some(remote), Some(local), Some(f.stored()));
        assert!(action.is_nop());
    }

    #[test]
    fn both_changed_divergently_is_a_conflict() {
        let f = Fixture::new(13);
        let remote = f.remote_with(false, "newer-history-etag");
        let local = f.local_with(f.modified_time + 60, "other-content-etag");
        let action = decide(Some(remote), Some(local), Some(f.stored()));
        assert!(matches!(
            action,
            SyncAction::Conflict { stored: Some(_), .. }
        ));
    }

    #[test]
    fn remote_tombstone_without_local_file_drops_the_row() {
        let f = Fixture::new(14);
        let action = decide(Some(f.remote_deleted()), None, Some(f.stored()));
        assert!(matches!(action, SyncAction::DeleteHistory { .. }));
    }

    #[test]
    fn remote_tombstone_without_bookkeeping_deletes_the_local_file() {
        let f = Fixture::new(15);
        let action = decide(Some(f.remote_deleted()), Some(f.local()), None);
        assert!(matches!(
            action,
            SyncAction::DeleteLocal { stored: None, .. }
        ));
    }

    #[test]
    fn remote_tombstone_with_unchanged_local_deletes_it() {
        let f = Fixture::new(16);
        let action = decide(Some(f.remote_deleted()), Some(f.local()), Some(f.stored()));
        assert!(matches!(
            action,
            SyncAction::DeleteLocal { stored: Some(_), .. }
        ));
    }

    #[test]
    fn remote_tombstone_with_local_edits_is_a_conflict() {
        let f = Fixture::new(17);
        let local = f.local_with(f.modified_time + 60, &f.content_etag);
        let action = decide(Some(f.remote_deleted()), Some(local), Some(f.stored()));
        assert!(matches!(action, SyncAction::Conflict { .. }));
    }

    #[test]
    fn deleted_remote_with_nothing_else_is_a_nop() {
        let f = Fixture::new(18);
        assert!(decide(Some(f.remote_deleted()), None, None).is_nop());
    }

    #[test]
    fn every_presence_combination_yields_an_action() {
        // Totality: all eight presence combinations decide without error.
        for mask in 0u8..8 {
            let f = Fixture::new(20 + u32::from(mask));
            let remote = (mask & 1 != 0).then(|| f.remote());
            let local = (mask & 2 != 0).then(|| f.local());
            let stored = (mask & 4 != 0).then(|| f.stored());
            let _ = decide(remote, local, stored);
        }
    }
}
