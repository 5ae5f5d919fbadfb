//! # Cursor — sequential archive byte access
//!
//! A forward-only cursor over the fully-loaded bytes of one archive file.
//! Every multi-byte integer in the archive format is little-endian, and
//! every read is bounds-checked against the bytes actually available, so
//! a truncated file surfaces as a typed [`Truncated`] error instead of a
//! panic or a short read.
//!
//! The cursor never seeks backward. Forward movement happens through the
//! `read_*` methods and [`skip`](ByteCursor::skip); [`find`](ByteCursor::find)
//! locates a byte pattern ahead of the cursor (used for marker-based
//! resynchronization) without moving it.

use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;

use thiserror::Error;

/// A read required more bytes than the archive has left.
///
/// The cursor position is unchanged when this is returned — the caller can
/// still inspect or scan the unread tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("needed {needed} bytes but only {remaining} remain")]
pub struct Truncated {
    /// Bytes the failed read required.
    pub needed: usize,
    /// Bytes that were actually left.
    pub remaining: usize,
}

/// Forward-only cursor over an in-memory archive image.
#[derive(Debug)]
pub struct ByteCursor {
    buf: Vec<u8>,
    pos: usize,
}

impl ByteCursor {
    /// Wraps an already-loaded archive image.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        ByteCursor { buf, pos: 0 }
    }

    /// Reads `source` to end and wraps the result.
    ///
    /// The source is consumed and dropped before this returns, so file
    /// handles are released at construction time.
    pub fn from_reader<R: Read>(mut source: R) -> std::io::Result<Self> {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf)?;
        Ok(ByteCursor { buf, pos: 0 })
    }

    /// Absolute byte offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the cursor and the end of the archive.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns the next `n` bytes and advances past them.
    pub fn read_exact(&mut self, n: usize) -> Result<&[u8], Truncated> {
        if self.remaining() < n {
            return Err(Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8, Truncated> {
        let b = self.read_exact(1)?;
        Ok(b[0])
    }

    /// Reads a little-endian unsigned 16-bit value.
    pub fn read_u16_le(&mut self) -> Result<u16, Truncated> {
        let b = self.read_exact(2)?;
        Ok(LittleEndian::read_u16(b))
    }

    /// Advances the cursor `n` bytes without inspecting them.
    pub fn skip(&mut self, n: usize) -> Result<(), Truncated> {
        if self.remaining() < n {
            return Err(Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        self.pos += n;
        Ok(())
    }

    /// Finds the next occurrence of `needle` at or after the cursor.
    ///
    /// Returns the absolute offset of the first matching byte, or `None`
    /// if the pattern does not occur in the unread tail. The cursor does
    /// not move; callers decide whether to [`skip`](ByteCursor::skip) to
    /// the match.
    ///
    /// Knuth-Morris-Pratt, so a marker straddling repeated prefix bytes is
    /// still found in one pass.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || self.remaining() < needle.len() {
            return None;
        }
        let table = failure_table(needle);
        let mut matched = 0;
        for (i, &b) in self.buf[self.pos..].iter().enumerate() {
            while matched > 0 && b != needle[matched] {
                matched = table[matched - 1];
            }
            if b == needle[matched] {
                matched += 1;
            }
            if matched == needle.len() {
                return Some(self.pos + i + 1 - matched);
            }
        }
        None
    }
}

/// KMP partial-match table: `table[i]` is the length of the longest proper
/// prefix of `needle[..=i]` that is also a suffix of it.
fn failure_table(needle: &[u8]) -> Vec<usize> {
    let mut table = vec![0usize; needle.len()];
    let mut k = 0;
    for i in 1..needle.len() {
        while k > 0 && needle[i] != needle[k] {
            k = table[k - 1];
        }
        if needle[i] == needle[k] {
            k += 1;
        }
        table[i] = k;
    }
    table
}
