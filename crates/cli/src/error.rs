//! crates/cli/src/error.rs

use std::io;

use thiserror::Error;

/// Fatal errors surfaced to the command line.
#[derive(Debug, Error)]
pub enum CliError {
    /// A required environment variable is missing.
    #[error("missing required environment variable {name}")]
    MissingEnv {
        /// Variable name.
        name: &'static str,
    },
    /// An environment variable holds an unusable value.
    #[error("invalid value for environment variable {name}: {value}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
    /// Engine failure (session setup, sync pass, rebuild).
    #[error(transparent)]
    Sync(#[from] engine::SyncError),
    /// Object-store failure outside a sync pass.
    #[error(transparent)]
    Remote(#[from] remote::RemoteError),
    /// Local database failure outside a sync pass.
    #[error(transparent)]
    Db(#[from] localdb::DbError),
    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}
