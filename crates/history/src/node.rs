//! crates/history/src/node.rs
//!
//! The per-file history document and the shortest-path diff.

use serde::{Deserialize, Serialize};

use crate::entry::NodeHistoryEntry;
use crate::error::HistoryError;
use crate::HistoryResult;

/// The shortest list of entries needed to materialise one version from
/// another, as computed by [`NodeHistory::diff`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffPath {
    /// Entries to apply, oldest first. When `is_absolute` holds, the first
    /// entry carries the base to download; any remaining entries are deltas.
    pub entries: Vec<NodeHistoryEntry>,
    /// Whether the path starts from a freshly downloaded base rather than
    /// from the caller's current version.
    pub is_absolute: bool,
}

/// The full version chain for one logical file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHistory {
    /// Root-relative POSIX path of the file.
    pub path: String,
    /// Stable file key; always `hash_path(path)`.
    pub key: String,
    /// Version chain, oldest first. Append-only.
    pub entries: Vec<NodeHistoryEntry>,
}

impl NodeHistory {
    /// Creates a history for `path` with the given entries, deriving the
    /// file key from the path.
    #[must_use]
    pub fn create(path: impl Into<String>, entries: Vec<NodeHistoryEntry>) -> Self {
        let path = path.into();
        let key = checksums::hash_path(&path);
        Self { path, key, entries }
    }

    /// Returns the final entry of the chain.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Empty`] when no entries exist and
    /// [`HistoryError::Tombstoned`] when the chain ends in a delete marker.
    pub fn last(&self) -> HistoryResult<&NodeHistoryEntry> {
        let last = self.entries.last().ok_or_else(|| HistoryError::Empty {
            key: self.key.clone(),
        })?;
        if last.deleted {
            return Err(HistoryError::Tombstoned {
                key: self.key.clone(),
            });
        }
        Ok(last)
    }

    /// Returns the content etag of the latest version.
    pub fn etag(&self) -> HistoryResult<&str> {
        let last = self.last()?;
        last.etag.as_deref().ok_or_else(|| HistoryError::MissingEtag {
            key: last.key.clone(),
        })
    }

    /// Returns `true` when the chain ends in a delete marker.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.entries.last().is_some_and(|e| e.deleted)
    }

    /// Appends an entry to the chain.
    pub fn add_entry(&mut self, entry: NodeHistoryEntry) {
        self.entries.push(entry);
    }

    /// Appends a tombstone, ending the current chain.
    pub fn add_delete_marker(&mut self) {
        self.entries.push(NodeHistoryEntry::create_deleted());
    }

    /// Computes the shortest path that materialises this chain's latest
    /// version starting from `other`'s latest version, or from scratch when
    /// `other` is absent.
    ///
    /// Walking the chain in reverse, deltas are collected until the walk
    /// reaches the caller's version (relative replay), a pure base (absolute
    /// restart), or the point where the collected delta bytes outweigh the
    /// most recent entry that carries a base, in which case the tail is cut
    /// back to that base and the path becomes absolute.
    pub fn diff(&self, other: Option<&NodeHistory>) -> HistoryResult<DiffPath> {
        match other {
            None => self.diff_from_scratch(),
            Some(other) => self.diff_from(other),
        }
    }

    /// Absolute path: everything from the most recent base onward.
    fn diff_from_scratch(&self) -> HistoryResult<DiffPath> {
        let mut collected = Vec::new();
        for entry in self.entries.iter().rev() {
            if entry.deleted {
                break;
            }
            collected.push(entry.clone());
            if entry.base_version.is_some() {
                collected.reverse();
                return Ok(DiffPath {
                    entries: collected,
                    is_absolute: true,
                });
            }
        }
        Err(HistoryError::NoReachableBase {
            key: self.key.clone(),
        })
    }

    fn diff_from(&self, other: &NodeHistory) -> HistoryResult<DiffPath> {
        let stop_key = other.last()?.key.clone();

        let mut collected: Vec<NodeHistoryEntry> = Vec::new();
        let mut is_absolute = false;
        // Most recent entry that carries a base: (index in `collected`,
        // size of its base blob).
        let mut candidate: Option<(usize, u64)> = None;
        let mut delta_size_sum = 0u64;

        for entry in self.entries.iter().rev() {
            if entry.deleted || entry.key == stop_key {
                break;
            }
            if !entry.has_delta {
                // A pure base ends the walk: replaying further would step
                // across a version boundary that has no delta.
                collected.push(entry.clone());
                is_absolute = true;
                break;
            }

            delta_size_sum += entry.delta_size;
            if entry.base_version.is_some() && candidate.is_none() {
                candidate = Some((collected.len(), entry.base_size));
            }
            if let Some((candidate_index, base_size)) = candidate {
                if delta_size_sum > base_size {
                    // Replaying the whole tail costs more bytes than
                    // downloading the candidate base and replaying from it.
                    collected.truncate(candidate_index + 1);
                    is_absolute = true;
                    break;
                }
            }
            collected.push(entry.clone());
        }

        collected.reverse();
        Ok(DiffPath {
            entries: collected,
            is_absolute,
        })
    }
}
