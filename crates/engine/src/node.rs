//! crates/engine/src/node.rs
//!
//! Snapshots of local files at scan time.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use localdb::StoredHistory;

use crate::session::Session;
use crate::{SyncError, SyncResult};

/// A local file as observed by one scan: identity, timestamps, size, and a
/// lazily computed content etag.
#[derive(Clone, Debug)]
pub struct LocalNode {
    /// Absolute path of the sync root this node belongs to.
    pub root_folder: PathBuf,
    /// Root-relative POSIX path.
    pub path: String,
    /// Stable file key derived from `path`.
    pub key: String,
    /// Modification time, integer seconds.
    pub modified_time: i64,
    /// Change/creation time, integer seconds.
    pub created_time: i64,
    /// File size in bytes.
    pub size: u64,
    etag: RefCell<Option<String>>,
}

impl LocalNode {
    /// Snapshots the file at `local_path`, which must live under the
    /// session's root folder.
    pub fn create(local_path: &Path, session: &Session) -> SyncResult<Self> {
        let root = &session.root_folder.path;
        let relative = local_path
            .strip_prefix(root)
            .map_err(|_| SyncError::OutsideRoot {
                path: local_path.to_string_lossy().into_owned(),
            })?;
        let path = posix_path(relative)?;
        let metadata = fs::metadata(local_path)?;

        Ok(Self {
            key: checksums::hash_path(&path),
            root_folder: root.clone(),
            path,
            modified_time: unix_seconds_modified(&metadata),
            created_time: unix_seconds_created(&metadata),
            size: metadata.len(),
            etag: RefCell::new(None),
        })
    }

    /// Absolute path of the file.
    #[must_use]
    pub fn local_path(&self) -> PathBuf {
        self.root_folder.join(&self.path)
    }

    /// Whether the file changed since `stored` was written: either timestamp
    /// differing counts as an update.
    #[must_use]
    pub fn updated(&self, stored: &StoredHistory) -> bool {
        self.modified_time != stored.local_modified_time
            || self.created_time != stored.local_created_time
    }

    /// Content etag (MD5 of the file), computed on first use and cached.
    pub fn calc_etag(&self) -> SyncResult<String> {
        let mut cached = self.etag.borrow_mut();
        if let Some(etag) = cached.as_ref() {
            return Ok(etag.clone());
        }
        let etag = checksums::file_md5_hex(&self.local_path())?;
        *cached = Some(etag.clone());
        Ok(etag)
    }

    #[cfg(test)]
    pub(crate) fn set_etag_for_tests(&self, etag: &str) {
        *self.etag.borrow_mut() = Some(etag.to_owned());
    }

    /// Bare snapshot for decision-table tests that never touch the disk.
    #[cfg(test)]
    pub(crate) fn for_tests(
        root_folder: PathBuf,
        path: &str,
        modified_time: i64,
        created_time: i64,
        size: u64,
    ) -> Self {
        Self {
            key: checksums::hash_path(path),
            root_folder,
            path: path.to_owned(),
            modified_time,
            created_time,
            size,
            etag: RefCell::new(None),
        }
    }
}

/// Renders a relative path with forward slashes, rejecting non-UTF-8 names.
fn posix_path(relative: &Path) -> SyncResult<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| SyncError::NonUtf8Path {
                path: relative.to_string_lossy().into_owned(),
            })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn unix_seconds_modified(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs() as i64)
}

#[cfg(unix)]
fn unix_seconds_created(metadata: &fs::Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;

    metadata.ctime()
}

#[cfg(not(unix))]
fn unix_seconds_created(metadata: &fs::Metadata) -> i64 {
    metadata
        .created()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs() as i64)
}

/// Recursively collects every file under the session root, following the
/// same files-only policy as the original scan.
pub fn scan_local_files(session: &Session) -> SyncResult<Vec<LocalNode>> {
    let mut paths = Vec::new();
    collect_files(&session.root_folder.path, &mut paths)?;

    let mut nodes = Vec::with_capacity(paths.len());
    for path in paths {
        nodes.push(LocalNode::create(&path, session)?);
    }
    Ok(nodes)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            out.push(path);
        } else if path.is_dir() {
            collect_files(&path, out)?;
        }
    }
    Ok(())
}
