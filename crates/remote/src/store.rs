//! crates/remote/src/store.rs
//!
//! The versioned object-store trait and its result records.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::RemoteResult;

/// Metadata returned by [`ObjectStore::head`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Version id of the latest version.
    pub version_id: Option<String>,
    /// ETag of the latest version, without surrounding quotes.
    pub etag: Option<String>,
    /// Object size in bytes.
    pub size: u64,
    /// Last-modified timestamp when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Outcome of a put.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutResult {
    /// Version id assigned by the bucket.
    pub version_id: Option<String>,
    /// ETag of the stored object, without surrounding quotes.
    pub etag: Option<String>,
}

/// One latest-version record from [`ObjectStore::list_latest_versions`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRecord {
    /// Full object key.
    pub key: String,
    /// Version id of the latest version.
    pub version_id: String,
    /// ETag of the latest version, without surrounding quotes.
    pub etag: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last-modified timestamp when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Versioned object-store operations used by the sync engine.
///
/// Implementations are blocking: the worker runs one action at a time and
/// always needs the result before proceeding.
pub trait ObjectStore: Send + Sync {
    /// Uploads the file at `path` as a new version of `bucket`/`key`.
    fn put(&self, bucket: &str, key: &str, path: &Path) -> RemoteResult<PutResult>;

    /// Uploads an in-memory buffer as a new version of `bucket`/`key`.
    fn put_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> RemoteResult<PutResult>;

    /// Uploads an in-memory buffer, requiring the current latest version to
    /// still carry `expected_etag`. `None` puts unconditionally.
    fn put_bytes_if_match(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        expected_etag: Option<&str>,
    ) -> RemoteResult<PutResult>;

    /// Downloads `bucket`/`key` (at `version` when given) into `path`.
    fn get(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        version: Option<&str>,
    ) -> RemoteResult<()>;

    /// Downloads `bucket`/`key` (at `version` when given) into memory.
    fn get_bytes(&self, bucket: &str, key: &str, version: Option<&str>) -> RemoteResult<Vec<u8>>;

    /// Returns metadata for the latest version of `bucket`/`key`.
    fn head(&self, bucket: &str, key: &str) -> RemoteResult<ObjectInfo>;

    /// Lists the latest version of every object under `prefix`, following
    /// pagination to the end. The prefix is normalised to end in `/`.
    fn list_latest_versions(&self, bucket: &str, prefix: &str) -> RemoteResult<Vec<VersionRecord>>;

    /// Deletes `bucket`/`key`.
    fn delete(&self, bucket: &str, key: &str) -> RemoteResult<()>;

    /// Permanently removes every version of every object under `prefix`,
    /// returning the number of versions removed. Used by the state-clearing
    /// utility, never by the sync loop.
    fn purge_prefix(&self, bucket: &str, prefix: &str) -> RemoteResult<u64>;
}

/// Normalises a listing prefix to end in exactly one slash.
#[must_use]
pub(crate) fn directory_prefix(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

/// Strips the quotes S3 wraps around ETag values.
#[must_use]
pub(crate) fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_owned()
}
