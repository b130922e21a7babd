//! crates/engine/src/error.rs
//!
//! The engine-wide error type and the fatal/recoverable split.

use std::io;

use thiserror::Error;

/// Errors surfaced while producing or executing sync actions.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Object-store failure.
    #[error(transparent)]
    Remote(#[from] remote::RemoteError),
    /// Local database failure.
    #[error(transparent)]
    Db(#[from] localdb::DbError),
    /// History invariant violation.
    #[error(transparent)]
    History(#[from] history::HistoryError),
    /// Signature, delta, or patch failure.
    #[error(transparent)]
    Delta(#[from] delta::DeltaError),
    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
    /// A history document failed to serialise or parse.
    #[error("history document error: {0}")]
    Json(
        #[from]
        #[source]
        serde_json::Error,
    ),
    /// A remote history handle was used before its body was loaded.
    #[error("remote history for {key} was used before loading")]
    HistoryNotLoaded {
        /// File key of the handle.
        key: String,
    },
    /// A local path under the root is not valid UTF-8 and cannot be mapped
    /// to an object key.
    #[error("path {path} is not valid UTF-8")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },
    /// A scanned file is outside the sync root.
    #[error("path {path} is outside the sync root")]
    OutsideRoot {
        /// Lossy rendering of the path.
        path: String,
    },
    /// A full-version rebuild was requested for a history that cannot take
    /// one.
    #[error("cannot rebuild a base for {key}: {reason}")]
    RebuildUnsupported {
        /// File key of the history.
        key: String,
        /// Which precondition failed.
        reason: String,
    },
}

impl SyncError {
    /// Whether this error indicates a broken invariant rather than a
    /// transient failure. Fatal errors terminate the worker; everything else
    /// is logged and retried on the next pass.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::History(_) | Self::HistoryNotLoaded { .. }
        )
    }
}
