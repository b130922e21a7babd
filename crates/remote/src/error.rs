//! crates/remote/src/error.rs
//!
//! Error type for object-store operations.

use std::io;

use thiserror::Error;

/// Errors surfaced by an [`ObjectStore`](crate::ObjectStore) backend.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The referenced object (or version) does not exist.
    #[error("object {bucket}/{key} not found")]
    NotFound {
        /// Bucket queried.
        bucket: String,
        /// Object key queried.
        key: String,
    },
    /// A conditional put observed a different ETag than expected.
    #[error("precondition failed for {bucket}/{key}: expected etag {expected}")]
    PreconditionFailed {
        /// Bucket written.
        bucket: String,
        /// Object key written.
        key: String,
        /// The ETag the caller expected to still be current.
        expected: String,
    },
    /// A put response did not include the version id a versioned bucket
    /// must return.
    #[error("bucket {bucket} returned no version id for {key}; is versioning enabled?")]
    MissingVersionId {
        /// Bucket written.
        bucket: String,
        /// Object key written.
        key: String,
    },
    /// Transport or service failure from the backend.
    #[error("object store request failed: {0}")]
    Request(String),
    /// Local file I/O while staging an upload or download.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}
