//! crates/delta/src/error.rs
//!
//! Error type shared by the signature, generate, and apply paths.

use std::io;

use thiserror::Error;

/// Errors that can occur during signature, delta, or patch operations.
#[derive(Debug, Error)]
pub enum DeltaError {
    /// I/O error from a source, signature, delta, or output file.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
    /// The signature stream is malformed or truncated.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    /// The delta stream is malformed or truncated.
    #[error("invalid delta: {0}")]
    InvalidDelta(String),
}
