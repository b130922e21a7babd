//! crates/localdb/src/error.rs

use thiserror::Error;

/// Errors surfaced by the local sync-state database.
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite-level failure.
    #[error("database error: {0}")]
    Sqlite(
        #[from]
        #[source]
        rusqlite::Error,
    ),
    /// The embedded history document in a row failed to parse.
    #[error("stored history for key {key} is corrupt: {source}")]
    CorruptHistory {
        /// File key of the offending row.
        key: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A history document could not be serialised for storage.
    #[error("failed to serialise history: {0}")]
    Serialise(#[source] serde_json::Error),
}
