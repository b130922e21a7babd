#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` drives the synchronization of one local root folder against a
//! versioned object store. Each pass gathers three views of every file (the
//! remote history listing, the local filesystem, and the stored snapshot of
//! the last successful sync), reconciles them into a sync action per file,
//! and executes the actions one at a time.
//!
//! # Design
//!
//! The moving parts mirror the data flow:
//!
//! - [`session`] bundles the per-run configuration and shared handles; it is
//!   passed by reference, never stored globally.
//! - [`node`] snapshots local files and derives their stable keys.
//! - [`remote_history`] wraps a remote history document through its
//!   `listed -> loaded -> saved` lifecycle.
//! - [`transfer`] moves content and metadata blobs through temp files.
//! - [`reconcile`] is the pure decision table from triple to [`SyncAction`].
//! - [`executor`] performs the actions' side effects.
//! - [`produce`] joins the three key-sorted views and emits a batch of
//!   actions.
//! - [`worker`] is the event-driven loop that schedules passes and runs one
//!   action at a time.
//!
//! # Errors
//!
//! [`SyncError`] distinguishes recoverable action failures (network, local
//! I/O, rsync), which the worker logs and implicitly retries on the next pass,
//! from invariant violations, which terminate the worker.

pub mod action;
mod error;
pub mod executor;
pub mod node;
pub mod produce;
pub mod reconcile;
pub mod rebuild;
pub mod remote_history;
mod rsync;
pub mod session;
pub mod transfer;
pub mod worker;

pub use action::SyncAction;
pub use error::SyncError;
pub use executor::{ActionExecutor, ActionOutcome, ConflictReport};
pub use node::LocalNode;
pub use produce::SyncActionProducer;
pub use reconcile::handle_node;
pub use remote_history::RemoteHistoryHandle;
pub use session::{Session, SessionConfig};
pub use worker::{SyncWorker, WorkerHandle};

/// Result alias for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Object-store blob name for an entry's delta.
pub const DELTA_BLOB: &str = "delta";

/// Object-store blob name for an entry's signature.
pub const SIGNATURE_BLOB: &str = "signature";
