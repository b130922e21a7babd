//! crates/delta/src/ops.rs
//!
//! Delta stream framing shared by the generate and apply paths.
//!
//! A delta is the magic followed by a sequence of commands, each introduced
//! by a one-byte tag: copy a byte range out of the base, emit literal bytes
//! carried inline, or end the stream.

pub(crate) const DELTA_MAGIC: [u8; 4] = *b"DLT1";

pub(crate) const OP_END: u8 = 0x00;
pub(crate) const OP_COPY: u8 = 0x01;
pub(crate) const OP_LITERAL: u8 = 0x02;
