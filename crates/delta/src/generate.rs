//! crates/delta/src/generate.rs
//!
//! Delta generation: slide a block-sized window over the new file, matching
//! blocks of the signed base by weak checksum first and strong sum second.

use std::io::{Read, Write};

use checksums::RollingChecksum;
use rustc_hash::FxHashMap;

use crate::error::DeltaError;
use crate::ops::{DELTA_MAGIC, OP_COPY, OP_END, OP_LITERAL};
use crate::signature::{FileSignature, strong_sum};
use crate::{BLOCK_LEN, DeltaResult};

/// Literal bytes are flushed in runs of at most this size.
const MAX_LITERAL_RUN: usize = 64 * 1024;

/// Read granularity for the sliding window.
const READ_CHUNK: usize = 64 * 1024;

/// Consumed window bytes are compacted away once they pass this mark.
const COMPACT_THRESHOLD: usize = 256 * 1024;

pub(crate) fn generate<R: Read, W: Write>(
    sig: &FileSignature,
    new: &mut R,
    out: &mut W,
) -> DeltaResult<()> {
    out.write_all(&DELTA_MAGIC)?;

    let index = SignatureIndex::build(sig);
    let mut window = SlidingWindow::new(new);
    let mut rolling = RollingChecksum::new();
    let mut rolling_valid = false;
    let mut emitter = Emitter::new(out);
    let block_len = BLOCK_LEN as usize;

    loop {
        window.ensure(block_len + 1)?;
        let avail = window.avail();
        if avail == 0 {
            break;
        }
        let wlen = avail.min(block_len);
        if !rolling_valid {
            rolling.update_from_block(window.peek(wlen));
            rolling_valid = true;
        }

        let matched = index.confirm(rolling.value(), wlen as u32, window.peek(wlen));
        if let Some(block_index) = matched {
            let offset = block_index as u64 * u64::from(BLOCK_LEN);
            emitter.copy(offset, wlen as u64)?;
            window.consume(wlen);
            rolling_valid = false;
        } else {
            let outgoing = window.peek(1)[0];
            emitter.literal(outgoing)?;
            if avail > wlen {
                let incoming = window.peek(wlen + 1)[wlen];
                rolling
                    .roll(outgoing, incoming)
                    .map_err(|err| DeltaError::InvalidSignature(err.to_string()))?;
            } else {
                // The window is shrinking towards EOF; recompute next round.
                rolling_valid = false;
            }
            window.consume(1);
        }
    }

    emitter.finish()
}

/// First-level lookup from rolling checksum to candidate base blocks.
struct SignatureIndex<'a> {
    sig: &'a FileSignature,
    by_rolling: FxHashMap<u32, Vec<u32>>,
}

impl<'a> SignatureIndex<'a> {
    fn build(sig: &'a FileSignature) -> Self {
        let mut by_rolling: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
        for (index, block) in sig.blocks().iter().enumerate() {
            by_rolling.entry(block.rolling).or_default().push(index as u32);
        }
        Self { sig, by_rolling }
    }

    /// Returns the first base block whose length and strong sum both match
    /// the current window.
    fn confirm(&self, rolling: u32, window_len: u32, window: &[u8]) -> Option<u32> {
        let candidates = self.by_rolling.get(&rolling)?;
        let mut strong = None;
        for &index in candidates {
            if self.sig.block_byte_len(index as usize) != window_len {
                continue;
            }
            let strong = strong.get_or_insert_with(|| strong_sum(window));
            if self.sig.blocks()[index as usize].strong == *strong {
                return Some(index);
            }
        }
        None
    }
}

/// Buffers the new file so the matcher can peek a block plus one byte ahead.
struct SlidingWindow<'r, R> {
    reader: &'r mut R,
    buf: Vec<u8>,
    start: usize,
    eof: bool,
}

impl<'r, R: Read> SlidingWindow<'r, R> {
    fn new(reader: &'r mut R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            start: 0,
            eof: false,
        }
    }

    fn avail(&self) -> usize {
        self.buf.len() - self.start
    }

    fn peek(&self, len: usize) -> &[u8] {
        &self.buf[self.start..self.start + len]
    }

    fn consume(&mut self, len: usize) {
        self.start += len;
    }

    /// Fills the buffer until `want` bytes are visible or the reader ends.
    fn ensure(&mut self, want: usize) -> DeltaResult<()> {
        while self.avail() < want && !self.eof {
            if self.start >= COMPACT_THRESHOLD {
                self.buf.drain(..self.start);
                self.start = 0;
            }
            let old_len = self.buf.len();
            self.buf.resize(old_len + READ_CHUNK, 0);
            match self.reader.read(&mut self.buf[old_len..]) {
                Ok(0) => {
                    self.buf.truncate(old_len);
                    self.eof = true;
                }
                Ok(n) => self.buf.truncate(old_len + n),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {
                    self.buf.truncate(old_len);
                }
                Err(err) => {
                    self.buf.truncate(old_len);
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }
}

/// Writes delta commands, coalescing adjacent copies and batching literals.
///
/// At most one of the two pending buffers is active at a time: starting a
/// copy flushes literals and vice versa, so command order is preserved.
struct Emitter<'w, W> {
    out: &'w mut W,
    literal: Vec<u8>,
    copy: Option<(u64, u64)>,
}

impl<'w, W: Write> Emitter<'w, W> {
    fn new(out: &'w mut W) -> Self {
        Self {
            out,
            literal: Vec::new(),
            copy: None,
        }
    }

    fn literal(&mut self, byte: u8) -> DeltaResult<()> {
        self.flush_copy()?;
        self.literal.push(byte);
        if self.literal.len() >= MAX_LITERAL_RUN {
            self.flush_literal()?;
        }
        Ok(())
    }

    fn copy(&mut self, offset: u64, len: u64) -> DeltaResult<()> {
        self.flush_literal()?;
        match &mut self.copy {
            Some((pending_offset, pending_len)) if *pending_offset + *pending_len == offset => {
                *pending_len += len;
            }
            _ => {
                self.flush_copy()?;
                self.copy = Some((offset, len));
            }
        }
        Ok(())
    }

    fn finish(mut self) -> DeltaResult<()> {
        self.flush_copy()?;
        self.flush_literal()?;
        self.out.write_all(&[OP_END])?;
        self.out.flush()?;
        Ok(())
    }

    fn flush_literal(&mut self) -> DeltaResult<()> {
        if self.literal.is_empty() {
            return Ok(());
        }
        self.out.write_all(&[OP_LITERAL])?;
        self.out.write_all(&(self.literal.len() as u64).to_le_bytes())?;
        self.out.write_all(&self.literal)?;
        self.literal.clear();
        Ok(())
    }

    fn flush_copy(&mut self) -> DeltaResult<()> {
        if let Some((offset, len)) = self.copy.take() {
            self.out.write_all(&[OP_COPY])?;
            self.out.write_all(&offset.to_le_bytes())?;
            self.out.write_all(&len.to_le_bytes())?;
        }
        Ok(())
    }
}
