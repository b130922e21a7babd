//! Rolling checksum used for weak block matching.
//!
//! Mirrors the Adler-32-style checksum rsync calls `rsum`: `s1` accumulates
//! the byte sum, `s2` accumulates prefix sums, both truncated to 16 bits.
//! Sliding the window by one byte is an O(1) update, which is what makes
//! scanning a new file for matching blocks affordable.

use thiserror::Error;

/// Errors surfaced by invalid rolling-checksum operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RollingError {
    /// [`RollingChecksum::roll`] was called before any bytes were observed.
    #[error("cannot roll an empty checksum window")]
    EmptyWindow,
    /// The window length no longer fits the 32-bit arithmetic used by `roll`.
    #[error("rolling window of {len} bytes exceeds the supported size")]
    WindowTooLarge {
        /// Observed window length.
        len: usize,
    },
}

/// Weak rolling checksum over a fixed-size window of bytes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RollingChecksum {
    s1: u32,
    s2: u32,
    len: usize,
}

impl RollingChecksum {
    /// Creates a rolling checksum with zeroed state.
    #[must_use]
    pub const fn new() -> Self {
        Self { s1: 0, s2: 0, len: 0 }
    }

    /// Returns the number of bytes that contributed to the current state.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bytes have been observed yet.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resets the checksum back to its initial state.
    pub fn reset(&mut self) {
        self.s1 = 0;
        self.s2 = 0;
        self.len = 0;
    }

    /// Updates the checksum with an additional slice of bytes.
    #[inline]
    pub fn update(&mut self, chunk: &[u8]) {
        let mut s1 = self.s1;
        let mut s2 = self.s2;
        for &byte in chunk {
            s1 = s1.wrapping_add(u32::from(byte)) & 0xffff;
            s2 = s2.wrapping_add(s1) & 0xffff;
        }
        self.s1 = s1;
        self.s2 = s2;
        self.len += chunk.len();
    }

    /// Clears the state and recomputes over `block`.
    pub fn update_from_block(&mut self, block: &[u8]) {
        self.reset();
        self.update(block);
    }

    /// Rolls the checksum by removing `outgoing` and appending `incoming`.
    ///
    /// The window size stays constant, so a full recompute is avoided while
    /// scanning a file one byte at a time.
    ///
    /// # Errors
    ///
    /// Returns [`RollingError::EmptyWindow`] if no bytes have been processed
    /// and [`RollingError::WindowTooLarge`] if the window length overflows
    /// the 32-bit roll arithmetic.
    #[inline]
    pub fn roll(&mut self, outgoing: u8, incoming: u8) -> Result<(), RollingError> {
        if self.len == 0 {
            return Err(RollingError::EmptyWindow);
        }
        let window_len =
            u32::try_from(self.len).map_err(|_| RollingError::WindowTooLarge { len: self.len })?;

        let out = u32::from(outgoing);
        let inn = u32::from(incoming);

        let new_s1 = self.s1.wrapping_sub(out).wrapping_add(inn) & 0xffff;
        let new_s2 = self
            .s2
            .wrapping_sub(window_len.wrapping_mul(out))
            .wrapping_add(new_s1)
            & 0xffff;

        self.s1 = new_s1;
        self.s2 = new_s2;
        Ok(())
    }

    /// Returns the packed 32-bit checksum value (`s2 << 16 | s1`).
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u32 {
        (self.s2 << 16) | self.s1
    }
}
