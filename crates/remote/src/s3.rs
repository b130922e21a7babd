//! crates/remote/src/s3.rs
//!
//! Blocking S3 backend over rusoto.
//!
//! The sync worker is single-threaded and wants results before choosing its
//! next step, so the async client is wrapped behind a small owned runtime.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusoto_core::{Region, RusotoError};
use rusoto_s3::{
    DeleteObjectRequest, GetObjectError, GetObjectRequest, HeadObjectRequest,
    ListObjectVersionsRequest, PutObjectRequest, S3, S3Client,
};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::error::RemoteError;
use crate::store::{ObjectInfo, ObjectStore, PutResult, VersionRecord, directory_prefix, trim_etag};
use crate::RemoteResult;

/// Listing page size, matching the S3 maximum.
const LIST_CHUNK: i64 = 1000;

/// [`ObjectStore`] backed by S3 through rusoto.
pub struct S3Store {
    client: S3Client,
    runtime: tokio::runtime::Runtime,
}

impl S3Store {
    /// Creates a store against the region resolved from the environment.
    pub fn new() -> RemoteResult<Self> {
        Self::with_region(Region::default())
    }

    /// Creates a store against an explicit region (or custom endpoint).
    pub fn with_region(region: Region) -> RemoteResult<Self> {
        let runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            client: S3Client::new(region),
            runtime,
        })
    }

    fn do_put(
        &self,
        bucket: &str,
        key: &str,
        body: rusoto_core::ByteStream,
        content_length: i64,
    ) -> RemoteResult<PutResult> {
        let request = PutObjectRequest {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            body: Some(body),
            content_length: Some(content_length),
            ..Default::default()
        };
        let output = self
            .runtime
            .block_on(self.client.put_object(request))
            .map_err(request_error)?;

        Ok(PutResult {
            version_id: output.version_id,
            etag: output.e_tag.as_deref().map(trim_etag),
        })
    }
}

impl ObjectStore for S3Store {
    fn put(&self, bucket: &str, key: &str, path: &Path) -> RemoteResult<PutResult> {
        let (stream, len) = self.runtime.block_on(async {
            let file = tokio::fs::File::open(path).await?;
            let len = file.metadata().await?.len();
            Ok::<_, std::io::Error>((ReaderStream::new(file), len))
        })?;
        let body = rusoto_core::ByteStream::new_with_size(stream, len as usize);
        self.do_put(bucket, key, body, len as i64)
    }

    fn put_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> RemoteResult<PutResult> {
        let len = data.len() as i64;
        self.do_put(bucket, key, data.to_vec().into(), len)
    }

    fn put_bytes_if_match(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        expected_etag: Option<&str>,
    ) -> RemoteResult<PutResult> {
        // S3 (of this client generation) has no conditional PUT, so the guard
        // is a read-compare-write with a small remaining window. The worker
        // re-derives its decisions on the next tick if a racing writer slips
        // through anyway.
        if let Some(expected) = expected_etag {
            let current = match self.head(bucket, key) {
                Ok(info) => info.etag,
                Err(RemoteError::NotFound { .. }) => None,
                Err(err) => return Err(err),
            };
            if current.as_deref() != Some(expected) {
                return Err(RemoteError::PreconditionFailed {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                    expected: expected.to_owned(),
                });
            }
        }
        self.put_bytes(bucket, key, data)
    }

    fn get(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        version: Option<&str>,
    ) -> RemoteResult<()> {
        let request = GetObjectRequest {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            version_id: version.map(ToOwned::to_owned),
            ..Default::default()
        };
        let output = self
            .runtime
            .block_on(self.client.get_object(request))
            .map_err(|err| get_error(bucket, key, err))?;
        let body = output.body.ok_or_else(|| {
            RemoteError::Request(format!("empty response body for {bucket}/{key}"))
        })?;

        self.runtime.block_on(async {
            let mut reader = body.into_async_read();
            let mut file = tokio::fs::File::create(path).await?;
            tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(())
        })?;
        Ok(())
    }

    fn get_bytes(&self, bucket: &str, key: &str, version: Option<&str>) -> RemoteResult<Vec<u8>> {
        let request = GetObjectRequest {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            version_id: version.map(ToOwned::to_owned),
            ..Default::default()
        };
        let output = self
            .runtime
            .block_on(self.client.get_object(request))
            .map_err(|err| get_error(bucket, key, err))?;
        let body = output.body.ok_or_else(|| {
            RemoteError::Request(format!("empty response body for {bucket}/{key}"))
        })?;

        let bytes = self.runtime.block_on(async {
            let mut reader = body.into_async_read();
            let mut buffer = Vec::new();
            tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
            Ok::<_, std::io::Error>(buffer)
        })?;
        Ok(bytes)
    }

    fn head(&self, bucket: &str, key: &str) -> RemoteResult<ObjectInfo> {
        let request = HeadObjectRequest {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            ..Default::default()
        };
        let output = self
            .runtime
            .block_on(self.client.head_object(request))
            .map_err(|err| status_error(bucket, key, err))?;

        Ok(ObjectInfo {
            version_id: output.version_id,
            etag: output.e_tag.as_deref().map(trim_etag),
            size: output.content_length.unwrap_or(0).max(0) as u64,
            last_modified: output.last_modified.as_deref().and_then(parse_timestamp),
        })
    }

    fn list_latest_versions(&self, bucket: &str, prefix: &str) -> RemoteResult<Vec<VersionRecord>> {
        let prefix = directory_prefix(prefix);
        let mut records = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            let request = ListObjectVersionsRequest {
                bucket: bucket.to_owned(),
                prefix: Some(prefix.clone()),
                max_keys: Some(LIST_CHUNK),
                key_marker: key_marker.take(),
                version_id_marker: version_id_marker.take(),
                ..Default::default()
            };
            let output = self
                .runtime
                .block_on(self.client.list_object_versions(request))
                .map_err(request_error)?;

            for version in output.versions.unwrap_or_default() {
                if !version.is_latest.unwrap_or(false) {
                    continue;
                }
                let (Some(key), Some(version_id), Some(etag)) =
                    (version.key, version.version_id, version.e_tag)
                else {
                    continue;
                };
                records.push(VersionRecord {
                    key,
                    version_id,
                    etag: trim_etag(&etag),
                    size: version.size.unwrap_or(0).max(0) as u64,
                    last_modified: version.last_modified.as_deref().and_then(parse_timestamp),
                });
            }

            if !output.is_truncated.unwrap_or(false) {
                break;
            }
            key_marker = output.next_key_marker;
            version_id_marker = output.next_version_id_marker;
        }

        Ok(records)
    }

    fn delete(&self, bucket: &str, key: &str) -> RemoteResult<()> {
        let request = DeleteObjectRequest {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            ..Default::default()
        };
        self.runtime
            .block_on(self.client.delete_object(request))
            .map_err(request_error)?;
        Ok(())
    }

    fn purge_prefix(&self, bucket: &str, prefix: &str) -> RemoteResult<u64> {
        let prefix = directory_prefix(prefix);
        let mut removed = 0u64;

        // Repeat head-of-listing deletes until the prefix is empty; delete
        // markers and old versions all go.
        loop {
            let request = ListObjectVersionsRequest {
                bucket: bucket.to_owned(),
                prefix: Some(prefix.clone()),
                max_keys: Some(LIST_CHUNK),
                ..Default::default()
            };
            let output = self
                .runtime
                .block_on(self.client.list_object_versions(request))
                .map_err(request_error)?;

            let mut targets: Vec<(String, Option<String>)> = Vec::new();
            for version in output.versions.unwrap_or_default() {
                if let Some(key) = version.key {
                    targets.push((key, version.version_id));
                }
            }
            for marker in output.delete_markers.unwrap_or_default() {
                if let Some(key) = marker.key {
                    targets.push((key, marker.version_id));
                }
            }
            if targets.is_empty() {
                return Ok(removed);
            }

            for (key, version_id) in targets {
                let request = DeleteObjectRequest {
                    bucket: bucket.to_owned(),
                    key,
                    version_id,
                    ..Default::default()
                };
                self.runtime
                    .block_on(self.client.delete_object(request))
                    .map_err(request_error)?;
                removed += 1;
            }
        }
    }
}

fn request_error<E: std::error::Error + 'static>(err: RusotoError<E>) -> RemoteError {
    RemoteError::Request(err.to_string())
}

/// Maps typed and untyped missing-object responses onto [`RemoteError::NotFound`].
fn get_error(bucket: &str, key: &str, err: RusotoError<GetObjectError>) -> RemoteError {
    match err {
        RusotoError::Service(GetObjectError::NoSuchKey(_)) => RemoteError::NotFound {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        },
        other => status_error(bucket, key, other),
    }
}

fn status_error<E: std::error::Error + 'static>(
    bucket: &str,
    key: &str,
    err: RusotoError<E>,
) -> RemoteError {
    match err {
        RusotoError::Unknown(response) if response.status.as_u16() == 404 => {
            RemoteError::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            }
        }
        other => RemoteError::Request(other.to_string()),
    }
}

/// S3 reports RFC 3339 timestamps in listings and RFC 2822 in object
/// responses; accept either.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::parse_timestamp;

    #[test]
    fn both_s3_timestamp_flavours_parse() {
        assert!(parse_timestamp("2026-07-01T10:00:00.000Z").is_some());
        assert!(parse_timestamp("Wed, 01 Jul 2026 10:00:00 GMT").is_some());
        assert!(parse_timestamp("not a timestamp").is_none());
    }
}
