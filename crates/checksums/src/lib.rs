#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `checksums` provides the weak and strong checksum primitives used by the
//! deltasync workspace. The rolling checksum drives block matching during
//! delta generation; the MD5 wrapper produces content etags, truncated block
//! sums, and the stable file keys that name history documents in the object
//! store.
//!
//! # Design
//!
//! - [`rolling`] implements the Adler-32-style weak checksum with an O(1)
//!   sliding-window update.
//! - [`strong`] exposes a streaming MD5 digest together with one-shot and
//!   whole-file helpers.
//!
//! # Invariants
//!
//! - `RollingChecksum` truncates both state components to 16 bits after every
//!   update, so `value()` is stable across incremental and one-shot use.
//! - Rolling updates reject an empty window so callers never observe silent
//!   state corruption.
//! - [`hash_path`] is deterministic: identical root-relative paths yield
//!   identical file keys on every client.

mod rolling;
mod strong;

pub use rolling::{RollingChecksum, RollingError};
pub use strong::{Md5, file_md5_hex, md5_hex, to_hex};

/// Derives the stable file key for a root-relative POSIX path.
///
/// The key is the lowercase hex MD5 of the UTF-8 path bytes. Every client
/// that syncs the same path arrives at the same key, which names the file's
/// history document under the internal metadata prefix.
#[must_use]
pub fn hash_path(path: &str) -> String {
    md5_hex(path.as_bytes())
}
