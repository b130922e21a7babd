#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `localdb` persists each client's view of its last successful sync: one
//! [`StoredHistory`] row per file, keyed by `(root folder, file key)` and
//! embedding the history document that was current when the row was written.
//! The reconciliation engine compares these rows against the live filesystem
//! and the remote listing to decide what changed on which side.
//!
//! # Design
//!
//! A single SQLite database holds two tables: `root_folder` and
//! `stored_node_history`, with a unique index on `(root_folder_id, key)` and
//! cascade delete from roots to rows. Writes are transactional per row; no
//! cross-row atomicity is needed because the worker touches one file per
//! action.

mod error;
mod store;

pub use error::DbError;
pub use store::{LocalDb, RootFolderRow, StoredHistory};

/// Result alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
