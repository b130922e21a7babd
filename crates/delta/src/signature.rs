//! crates/delta/src/signature.rs
//!
//! Block signature format: per-block weak and strong sums over a base file.

use std::io::{Read, Write};

use checksums::{Md5, RollingChecksum};

use crate::error::DeltaError;
use crate::{BLOCK_LEN, DeltaResult, STRONG_LEN};

const SIG_MAGIC: [u8; 4] = *b"DSG1";

/// Weak and strong checksums for one base block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSum {
    /// Packed rolling checksum of the block.
    pub rolling: u32,
    /// Truncated MD5 of the block.
    pub strong: [u8; STRONG_LEN as usize],
}

/// Parsed signature of a base file.
///
/// Every block is [`BLOCK_LEN`] bytes except possibly the last; the header
/// records the base file size so the final block's length is recoverable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSignature {
    file_size: u64,
    blocks: Vec<BlockSum>,
}

impl FileSignature {
    /// Computes the signature of `base` by reading it to the end.
    pub fn generate<R: Read>(base: &mut R) -> DeltaResult<Self> {
        let mut blocks = Vec::new();
        let mut file_size = 0u64;
        let mut buffer = vec![0u8; BLOCK_LEN as usize];

        loop {
            let filled = read_block(base, &mut buffer)?;
            if filled == 0 {
                break;
            }
            file_size += filled as u64;
            blocks.push(block_sum(&buffer[..filled]));
            if filled < buffer.len() {
                break;
            }
        }

        Ok(Self { file_size, blocks })
    }

    /// Returns the size of the signed base file.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Returns the per-block checksums in base order.
    #[must_use]
    pub fn blocks(&self) -> &[BlockSum] {
        &self.blocks
    }

    /// Returns the byte length of block `index` (the final block may be
    /// short).
    #[must_use]
    pub fn block_byte_len(&self, index: usize) -> u32 {
        let start = index as u64 * u64::from(BLOCK_LEN);
        let remaining = self.file_size.saturating_sub(start);
        remaining.min(u64::from(BLOCK_LEN)) as u32
    }

    /// Serialises the signature.
    pub fn write_to<W: Write>(&self, out: &mut W) -> DeltaResult<()> {
        out.write_all(&SIG_MAGIC)?;
        out.write_all(&BLOCK_LEN.to_le_bytes())?;
        out.write_all(&STRONG_LEN.to_le_bytes())?;
        out.write_all(&self.file_size.to_le_bytes())?;
        for block in &self.blocks {
            out.write_all(&block.rolling.to_le_bytes())?;
            out.write_all(&block.strong)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Parses a signature, validating the magic and fixed parameters.
    pub fn read_from<R: Read>(input: &mut R) -> DeltaResult<Self> {
        let mut magic = [0u8; 4];
        input
            .read_exact(&mut magic)
            .map_err(|_| DeltaError::InvalidSignature("missing header".to_owned()))?;
        if magic != SIG_MAGIC {
            return Err(DeltaError::InvalidSignature(format!(
                "bad magic {magic:02x?}"
            )));
        }

        let block_len = read_u32(input, "block length")?;
        let strong_len = read_u32(input, "strong length")?;
        if block_len != BLOCK_LEN || strong_len != STRONG_LEN {
            return Err(DeltaError::InvalidSignature(format!(
                "unsupported parameters block_len={block_len} strong_len={strong_len}"
            )));
        }

        let file_size = read_u64(input, "file size")?;
        let expected_blocks = file_size.div_ceil(u64::from(BLOCK_LEN));

        let mut blocks = Vec::with_capacity(expected_blocks.min(1 << 20) as usize);
        for index in 0..expected_blocks {
            let rolling = read_u32(input, "block record")?;
            let mut strong = [0u8; STRONG_LEN as usize];
            input.read_exact(&mut strong).map_err(|_| {
                DeltaError::InvalidSignature(format!("truncated block record {index}"))
            })?;
            blocks.push(BlockSum { rolling, strong });
        }

        Ok(Self { file_size, blocks })
    }
}

/// Computes the truncated strong sum for one block.
#[must_use]
pub(crate) fn strong_sum(block: &[u8]) -> [u8; STRONG_LEN as usize] {
    let digest = Md5::digest(block);
    let mut strong = [0u8; STRONG_LEN as usize];
    strong.copy_from_slice(&digest[..STRONG_LEN as usize]);
    strong
}

fn block_sum(block: &[u8]) -> BlockSum {
    let mut rolling = RollingChecksum::new();
    rolling.update(block);
    BlockSum {
        rolling: rolling.value(),
        strong: strong_sum(block),
    }
}

/// Reads into `buffer` until it is full or the reader is exhausted.
fn read_block<R: Read>(reader: &mut R, buffer: &mut [u8]) -> DeltaResult<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}

fn read_u32<R: Read>(input: &mut R, what: &str) -> DeltaResult<u32> {
    let mut bytes = [0u8; 4];
    input
        .read_exact(&mut bytes)
        .map_err(|_| DeltaError::InvalidSignature(format!("truncated {what}")))?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64<R: Read>(input: &mut R, what: &str) -> DeltaResult<u64> {
    let mut bytes = [0u8; 8];
    input
        .read_exact(&mut bytes)
        .map_err(|_| DeltaError::InvalidSignature(format!("truncated {what}")))?;
    Ok(u64::from_le_bytes(bytes))
}
