//! Bounds-checked cursor over a raw event buffer.

use crate::decoder::DecodeError;
use byteorder::{ByteOrder, LittleEndian};

const WORD_BYTES: usize = 4;

/// Read cursor over a borrowed byte buffer with a declared length.
///
/// Every read is checked against the declared length; the cursor never
/// touches bytes past it, even if the underlying slice is longer.
#[derive(Debug, Clone)]
pub struct RawFrame<'a> {
    data: &'a [u8],
    declared_len: usize,
    offset: usize,
}

impl<'a> RawFrame<'a> {
    /// Creates a cursor at offset 0. `declared_len` is clamped to the slice length.
    pub fn new(data: &'a [u8], declared_len: usize) -> Self {
        Self {
            data,
            declared_len: declared_len.min(data.len()),
            offset: 0,
        }
    }

    /// Creates a cursor covering the whole slice.
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self::new(data, data.len())
    }

    /// Current byte offset.
    #[inline]
    pub fn position(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn declared_len(&self) -> usize {
        self.declared_len
    }

    /// Bytes left before the declared length.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.declared_len.saturating_sub(self.offset)
    }

    /// Reads one little-endian word and advances by 4 bytes.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let end = self.check(WORD_BYTES)?;
        let value = LittleEndian::read_u32(&self.data[self.offset..end]);
        self.offset = end;
        Ok(value)
    }

    /// Moves the cursor to an absolute word offset.
    ///
    /// Seeking exactly to the end is allowed; the next read will fail.
    pub fn seek(&mut self, word_offset: usize) -> Result<(), DecodeError> {
        let target = word_offset
            .checked_mul(WORD_BYTES)
            .filter(|&t| t <= self.declared_len)
            .ok_or(DecodeError::OutOfBounds {
                offset: self.offset,
                width: word_offset.saturating_mul(WORD_BYTES).saturating_sub(self.offset),
                len: self.declared_len,
            })?;
        self.offset = target;
        Ok(())
    }

    #[inline]
    fn check(&self, width: usize) -> Result<usize, DecodeError> {
        match self.offset.checked_add(width) {
            Some(end) if end <= self.declared_len => Ok(end),
            _ => Err(DecodeError::OutOfBounds {
                offset: self.offset,
                width,
                len: self.declared_len,
            }),
        }
    }
}
