#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `remote` is the object-store boundary of deltasync. The [`ObjectStore`]
//! trait exposes the handful of versioned operations the sync engine needs
//! (put, conditional put, get, head, latest-version listing, delete), and two
//! backends implement it:
//!
//! - [`S3Store`] talks to real S3 buckets through rusoto, wrapping the async
//!   client in a blocking facade so the single-threaded sync worker can call
//!   it directly. Both buckets must have versioning enabled; put responses
//!   expose the new version id.
//! - [`MemoryStore`] keeps versioned objects in process memory and backs the
//!   end-to-end test scenarios.
//!
//! # Design
//!
//! The trait is object-safe and synchronous on purpose: exactly one sync
//! action is in flight at a time, and every caller wants the result before
//! deciding its next step. Histories and metadata blobs are small, so the
//! byte-buffer variants (`put_bytes`/`get_bytes`) cover them; content blobs
//! move through files.

mod error;
mod memory;
mod s3;
mod store;

pub use error::RemoteError;
pub use memory::MemoryStore;
pub use s3::S3Store;
pub use store::{ObjectInfo, ObjectStore, PutResult, VersionRecord};

/// Result alias for object-store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;
