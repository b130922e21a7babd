//! crates/history/src/error.rs
//!
//! Invariant violations surfaced by history documents.

use thiserror::Error;

/// Errors raised when a history chain is used outside its invariants.
///
/// These are bugs or corrupted documents rather than recoverable sync
/// failures; the worker treats them as fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    /// `last` was requested on a chain with no entries.
    #[error("history for {key} has no entries")]
    Empty {
        /// File key of the offending history.
        key: String,
    },
    /// `last` was requested on a chain ending in a tombstone.
    #[error("history for {key} ends in a delete marker")]
    Tombstoned {
        /// File key of the offending history.
        key: String,
    },
    /// The final entry carries no content etag.
    #[error("history entry {key} has no etag")]
    MissingEtag {
        /// Entry key of the offending entry.
        key: String,
    },
    /// A reverse walk found no entry with a base to start from.
    #[error("history for {key} has no reachable base")]
    NoReachableBase {
        /// File key of the offending history.
        key: String,
    },
}
