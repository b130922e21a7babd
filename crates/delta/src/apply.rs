//! crates/delta/src/apply.rs
//!
//! Patch application: replay copy and literal commands against a seekable
//! base to rebuild the target file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::DeltaError;
use crate::ops::{DELTA_MAGIC, OP_COPY, OP_END, OP_LITERAL};
use crate::DeltaResult;

pub(crate) fn apply<R: Read, W: Write>(
    base: &mut File,
    delta: &mut R,
    out: &mut W,
) -> DeltaResult<()> {
    let mut magic = [0u8; 4];
    delta
        .read_exact(&mut magic)
        .map_err(|_| DeltaError::InvalidDelta("missing header".to_owned()))?;
    if magic != DELTA_MAGIC {
        return Err(DeltaError::InvalidDelta(format!("bad magic {magic:02x?}")));
    }

    loop {
        let mut tag = [0u8; 1];
        delta
            .read_exact(&mut tag)
            .map_err(|_| DeltaError::InvalidDelta("missing end marker".to_owned()))?;

        match tag[0] {
            OP_END => break,
            OP_COPY => {
                let offset = read_u64(delta)?;
                let len = read_u64(delta)?;
                base.seek(SeekFrom::Start(offset))?;
                let copied = io::copy(&mut Read::by_ref(base).take(len), out)?;
                if copied != len {
                    return Err(DeltaError::InvalidDelta(format!(
                        "copy of {len} bytes at offset {offset} ran past the end of the base"
                    )));
                }
            }
            OP_LITERAL => {
                let len = read_u64(delta)?;
                let copied = io::copy(&mut delta.by_ref().take(len), out)?;
                if copied != len {
                    return Err(DeltaError::InvalidDelta(
                        "literal run truncated".to_owned(),
                    ));
                }
            }
            other => {
                return Err(DeltaError::InvalidDelta(format!(
                    "unknown command tag {other:#04x}"
                )));
            }
        }
    }

    out.flush()?;
    Ok(())
}

fn read_u64<R: Read>(input: &mut R) -> DeltaResult<u64> {
    let mut bytes = [0u8; 8];
    input
        .read_exact(&mut bytes)
        .map_err(|_| DeltaError::InvalidDelta("truncated command".to_owned()))?;
    Ok(u64::from_le_bytes(bytes))
}
