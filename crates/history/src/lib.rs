#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `history` models the version chain of one synchronized file. A
//! [`NodeHistory`] is an append-only sequence of [`NodeHistoryEntry`] links:
//! full bases, deltas against the previous reachable version, combined
//! base-plus-delta entries, and tombstones that end a chain. The document
//! serialises to the JSON layout stored in the internal bucket.
//!
//! # Design
//!
//! The interesting operation is [`NodeHistory::diff`]: given the chain a
//! client last materialised, it computes the shortest list of entries needed
//! to reach the latest version: either by replaying recent deltas or, when
//! their combined size outgrows a more recent base, by starting over from
//! that base. The trade-off is purely byte-count driven.
//!
//! # Invariants
//!
//! - `key` always equals the MD5 file key of `path`.
//! - Entries are append-only; chains never shrink.
//! - The first non-deleted entry of a chain (and of each post-tombstone
//!   chain) carries a base, otherwise no version is reachable.
//! - [`NodeHistory::last`] is an error on an empty or tombstone-terminated
//!   chain; callers must check [`NodeHistory::is_deleted`] first.

mod entry;
mod error;
mod node;

pub use entry::NodeHistoryEntry;
pub use error::HistoryError;
pub use node::{DiffPath, NodeHistory};

/// Result alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;
