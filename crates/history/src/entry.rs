//! crates/history/src/entry.rs
//!
//! One link in a file's version chain.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One entry of a [`NodeHistory`](crate::NodeHistory) chain.
///
/// Three content-bearing shapes exist (base-only, delta-only, and "whole",
/// with both representations present), plus the tombstone that marks deletion.
/// The entry key doubles as the object-store name of the entry's delta and
/// signature blobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHistoryEntry {
    /// Fresh 128-bit identifier assigned at creation time.
    pub key: String,
    /// Tombstone marker; a `true` value ends the current chain.
    pub deleted: bool,
    /// Content checksum of the version this entry produces; absent on
    /// tombstones.
    pub etag: Option<String>,
    /// Object-store version id of a full base blob, when one exists.
    pub base_version: Option<String>,
    /// Size of the base blob in bytes, 0 when there is none.
    pub base_size: u64,
    /// Whether a delta blob is stored under this entry's key.
    pub has_delta: bool,
    /// Size of the delta blob in bytes, 0 when there is none.
    pub delta_size: u64,
}

impl NodeHistoryEntry {
    /// Generates a fresh 128-bit entry key in lowercase hex.
    #[must_use]
    pub fn generate_key() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill(&mut bytes[..]);
        checksums::to_hex(&bytes)
    }

    /// Creates an entry produced by downloading a full base blob.
    #[must_use]
    pub fn create_base_only(key: String, etag: String, base_version: String, base_size: u64) -> Self {
        Self {
            key,
            deleted: false,
            etag: Some(etag),
            base_version: Some(base_version),
            base_size,
            has_delta: false,
            delta_size: 0,
        }
    }

    /// Creates an entry produced by patching the previous version.
    #[must_use]
    pub fn create_delta_only(key: String, etag: String, delta_size: u64) -> Self {
        Self {
            key,
            deleted: false,
            etag: Some(etag),
            base_version: None,
            base_size: 0,
            has_delta: true,
            delta_size,
        }
    }

    /// Creates a tombstone ending the current chain.
    #[must_use]
    pub fn create_deleted() -> Self {
        Self {
            key: Self::generate_key(),
            deleted: true,
            etag: None,
            base_version: None,
            base_size: 0,
            has_delta: false,
            delta_size: 0,
        }
    }

    /// Promotes a delta-only entry to the "whole" shape after a fresh base
    /// for the same version was uploaded.
    pub fn attach_base(&mut self, base_version: String, base_size: u64) {
        self.base_version = Some(base_version);
        self.base_size = base_size;
    }

    /// Returns `true` when the entry carries a base and no delta.
    #[must_use]
    pub fn is_base_only(&self) -> bool {
        self.base_version.is_some() && !self.has_delta
    }
}
