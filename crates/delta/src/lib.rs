#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `delta` implements the three whole-file operations the sync engine builds
//! on: generate a block [`signature`] of a base file, compute a [`delta`]
//! that rebuilds a new file from a signed base, and [`patch`] a base with a
//! delta to materialise the new file. All three are pure: the outputs depend
//! only on the named input files.
//!
//! # Design
//!
//! The signature records one weak rolling checksum and one truncated MD5 per
//! block. Delta generation slides a block-sized window over the new file,
//! using the rolling checksum as a first-level filter and the strong sum as
//! confirmation; matched blocks become copy commands against the base,
//! everything else is carried as literal bytes. Adjacent copies coalesce, so
//! an unchanged file produces a delta of a single copy command.
//!
//! Block size and strong-sum length are fixed workspace-wide
//! ([`BLOCK_LEN`], [`STRONG_LEN`]); the formats are private to deltasync and
//! carry magics plus the parameters so mismatched inputs fail loudly instead
//! of producing corrupt output.
//!
//! # Errors
//!
//! All failures surface as [`DeltaError`]: I/O errors from either side,
//! malformed signature or delta streams, and parameter mismatches. Any error
//! is fatal for the enclosing sync action.

mod apply;
mod error;
mod generate;
mod ops;
mod signature;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub use error::DeltaError;
pub use signature::{BlockSum, FileSignature};

/// Result alias for delta operations.
pub type DeltaResult<T> = Result<T, DeltaError>;

/// Fixed block length for signatures and deltas, in bytes.
pub const BLOCK_LEN: u32 = 2048;

/// Fixed truncated strong-sum length, in bytes.
pub const STRONG_LEN: u32 = 8;

/// Writes the block signature of `base_path` to `sig_path`.
pub fn signature(base_path: &Path, sig_path: &Path) -> DeltaResult<()> {
    let mut base = BufReader::new(File::open(base_path)?);
    let mut out = BufWriter::new(File::create(sig_path)?);
    let sig = FileSignature::generate(&mut base)?;
    sig.write_to(&mut out)?;
    Ok(())
}

/// Computes the delta that rebuilds `new_path` from the file described by
/// `sig_path`, writing it to `delta_path`.
pub fn delta(sig_path: &Path, new_path: &Path, delta_path: &Path) -> DeltaResult<()> {
    let mut sig_reader = BufReader::new(File::open(sig_path)?);
    let sig = FileSignature::read_from(&mut sig_reader)?;
    let mut new = BufReader::new(File::open(new_path)?);
    let mut out = BufWriter::new(File::create(delta_path)?);
    generate::generate(&sig, &mut new, &mut out)
}

/// Applies the delta at `delta_path` to `base_path`, writing the result to
/// `out_path`.
pub fn patch(base_path: &Path, delta_path: &Path, out_path: &Path) -> DeltaResult<()> {
    let mut base = File::open(base_path)?;
    let mut delta = BufReader::new(File::open(delta_path)?);
    let mut out = BufWriter::new(File::create(out_path)?);
    apply::apply(&mut base, &mut delta, &mut out)
}
