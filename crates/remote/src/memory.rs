//! crates/remote/src/memory.rs
//!
//! In-process versioned object store backing the end-to-end test scenarios.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::error::RemoteError;
use crate::store::{ObjectInfo, ObjectStore, PutResult, VersionRecord, directory_prefix};
use crate::RemoteResult;

#[derive(Clone, Debug)]
struct StoredVersion {
    version_id: String,
    etag: String,
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// An [`ObjectStore`] that keeps every version of every object in memory.
///
/// Version ids are monotonically increasing, the latest version of a key is
/// the last one stored, and ETags are the MD5 of the payload, the same
/// shape a versioned S3 bucket presents for simple puts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Vec<StoredVersion>>>>,
    next_version: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn store_version(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        expected_etag: Option<&str>,
    ) -> RemoteResult<PutResult> {
        let mut buckets = self.buckets.lock().expect("memory store poisoned");
        let versions = buckets
            .entry(bucket.to_owned())
            .or_default()
            .entry(key.to_owned())
            .or_default();

        if let Some(expected) = expected_etag {
            let current = versions.last().map(|v| v.etag.as_str());
            if current != Some(expected) {
                return Err(RemoteError::PreconditionFailed {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                    expected: expected.to_owned(),
                });
            }
        }

        let version_id = format!("mem-{:08}", self.next_version.fetch_add(1, Ordering::SeqCst));
        let etag = checksums::md5_hex(&data);
        versions.push(StoredVersion {
            version_id: version_id.clone(),
            etag: etag.clone(),
            data,
            last_modified: Utc::now(),
        });

        Ok(PutResult {
            version_id: Some(version_id),
            etag: Some(etag),
        })
    }

    fn read_version(
        &self,
        bucket: &str,
        key: &str,
        version: Option<&str>,
    ) -> RemoteResult<Vec<u8>> {
        let buckets = self.buckets.lock().expect("memory store poisoned");
        let versions = buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .filter(|versions| !versions.is_empty())
            .ok_or_else(|| RemoteError::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })?;

        let found = match version {
            Some(id) => versions.iter().find(|v| v.version_id == id),
            None => versions.last(),
        };
        found
            .map(|v| v.data.clone())
            .ok_or_else(|| RemoteError::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, bucket: &str, key: &str, path: &Path) -> RemoteResult<PutResult> {
        let data = fs::read(path)?;
        self.store_version(bucket, key, data, None)
    }

    fn put_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> RemoteResult<PutResult> {
        self.store_version(bucket, key, data.to_vec(), None)
    }

    fn put_bytes_if_match(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        expected_etag: Option<&str>,
    ) -> RemoteResult<PutResult> {
        self.store_version(bucket, key, data.to_vec(), expected_etag)
    }

    fn get(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        version: Option<&str>,
    ) -> RemoteResult<()> {
        let data = self.read_version(bucket, key, version)?;
        fs::write(path, data)?;
        Ok(())
    }

    fn get_bytes(&self, bucket: &str, key: &str, version: Option<&str>) -> RemoteResult<Vec<u8>> {
        self.read_version(bucket, key, version)
    }

    fn head(&self, bucket: &str, key: &str) -> RemoteResult<ObjectInfo> {
        let buckets = self.buckets.lock().expect("memory store poisoned");
        let latest = buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .and_then(|versions| versions.last())
            .ok_or_else(|| RemoteError::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })?;

        Ok(ObjectInfo {
            version_id: Some(latest.version_id.clone()),
            etag: Some(latest.etag.clone()),
            size: latest.data.len() as u64,
            last_modified: Some(latest.last_modified),
        })
    }

    fn list_latest_versions(&self, bucket: &str, prefix: &str) -> RemoteResult<Vec<VersionRecord>> {
        let prefix = directory_prefix(prefix);
        let buckets = self.buckets.lock().expect("memory store poisoned");
        let Some(objects) = buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for (key, versions) in objects.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            if let Some(latest) = versions.last() {
                records.push(VersionRecord {
                    key: key.clone(),
                    version_id: latest.version_id.clone(),
                    etag: latest.etag.clone(),
                    size: latest.data.len() as u64,
                    last_modified: Some(latest.last_modified),
                });
            }
        }
        Ok(records)
    }

    fn delete(&self, bucket: &str, key: &str) -> RemoteResult<()> {
        let mut buckets = self.buckets.lock().expect("memory store poisoned");
        if let Some(objects) = buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    fn purge_prefix(&self, bucket: &str, prefix: &str) -> RemoteResult<u64> {
        let prefix = directory_prefix(prefix);
        let mut buckets = self.buckets.lock().expect("memory store poisoned");
        let Some(objects) = buckets.get_mut(bucket) else {
            return Ok(0);
        };

        let doomed: Vec<String> = objects
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();
        let mut removed = 0u64;
        for key in doomed {
            if let Some(versions) = objects.remove(&key) {
                removed += versions.len() as u64;
            }
        }
        Ok(removed)
    }
}
