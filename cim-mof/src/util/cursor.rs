/*!
 Bounds-checked sequential reader over a MOF byte buffer.

 A failed read never moves the cursor, so the position reported in an error is always the
 position at which the failed read started.
*/

use crate::error::mof::MofError;

/// Reads little-endian primitives from a byte buffer, tracking the current position
#[derive(Debug, Clone)]
pub struct MofCursor<'a> {
    /// The whole buffer; positions are always absolute offsets into it
    stream: &'a [u8],
    /// The current index we are at in the stream
    idx: usize,
    /// Reads may not cross this index
    end: usize,
}

impl<'a> MofCursor<'a> {
    /// Create a cursor at the start of `stream`
    pub fn new(stream: &'a [u8]) -> Self {
        Self {
            stream,
            idx: 0,
            end: stream.len(),
        }
    }

    /// Create a cursor at `idx`, which may be equal to, but not greater than, the stream length
    pub fn at(stream: &'a [u8], idx: usize) -> Result<Self, MofError> {
        if idx > stream.len() {
            return Err(MofError::OffsetOutOfRange {
                offset: idx,
                len: stream.len(),
            });
        }
        Ok(Self {
            stream,
            idx,
            end: stream.len(),
        })
    }

    /// The absolute position of the next byte to read
    pub fn position(&self) -> usize {
        self.idx
    }

    /// The number of bytes left before the end of the cursor
    pub fn remaining(&self) -> usize {
        self.end - self.idx
    }

    /// Whether every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.idx == self.end
    }

    /// The unread bytes, without advancing
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.stream[self.idx..self.end]
    }

    /// Read exactly `n` bytes from the stream
    pub fn read_exact_bytes(&mut self, n: usize) -> Result<&'a [u8], MofError> {
        let range = self
            .idx
            .checked_add(n)
            .filter(|stop| *stop <= self.end)
            .and_then(|stop| self.stream.get(self.idx..stop))
            .ok_or(MofError::OutOfBounds {
                offset: self.idx,
                wanted: n,
                end: self.end,
            })?;
        self.idx += n;
        Ok(range)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], MofError> {
        let mut out = [0; N];
        out.copy_from_slice(self.read_exact_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, MofError> {
        Ok(u8::from_le_bytes(self.read_array()?))
    }

    pub fn read_i8(&mut self) -> Result<i8, MofError> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, MofError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, MofError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, MofError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, MofError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, MofError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, MofError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, MofError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, MofError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Read a `u32` length followed by that many bytes
    ///
    /// If the payload does not fit, the cursor stays before the length prefix.
    pub fn read_length_prefixed_bytes(&mut self) -> Result<&'a [u8], MofError> {
        let start = self.idx;
        let length = self.read_u32()? as usize;
        match self.read_exact_bytes(length) {
            Ok(bytes) => Ok(bytes),
            Err(why) => {
                self.idx = start;
                Err(why)
            }
        }
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String, MofError> {
        let start = self.idx;
        let bytes = self.read_length_prefixed_bytes()?;
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(why) => {
                self.idx = start;
                Err(MofError::InvalidString {
                    offset: start,
                    source: why,
                })
            }
        }
    }

    /// Split off the next `len` bytes as their own cursor and advance past them
    ///
    /// Positions reported by the returned cursor are still absolute.
    pub fn read_block(&mut self, len: usize) -> Result<MofCursor<'a>, MofError> {
        let start = self.idx;
        self.read_exact_bytes(len)?;
        Ok(MofCursor {
            stream: self.stream,
            idx: start,
            end: self.idx,
        })
    }

    /// Ensure a block was consumed completely
    pub fn finish(&self) -> Result<(), MofError> {
        if !self.is_empty() {
            return Err(MofError::TrailingBytes {
                end: self.end,
                trailing: self.remaining(),
            });
        }
        Ok(())
    }
}
