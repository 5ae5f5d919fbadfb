//! # Inflate — streaming raw-DEFLATE decompression
//!
//! The archive writer deflates records through one long-lived stream and
//! sync-flushes after each record, so a record's compressed bytes may
//! back-reference data from *earlier* records. Decoding therefore needs a
//! single stateful decompressor per archive, fed one record at a time and
//! never reset between records.
//!
//! The stream is raw DEFLATE — no zlib or gzip container, the
//! negative-window-bits convention — and a per-record inflate is only
//! successful if the underlying stream reports plain `Ok`: a sync-flushed
//! stream has no end-of-stream until the writer closes it, so `StreamEnd`
//! mid-archive is as wrong as an outright error.

use flate2::{Decompress, FlushDecompress, Status};

use thiserror::Error;

/// A record's compressed payload could not be inflated.
#[derive(Debug, Error)]
pub enum InflateError {
    /// The DEFLATE stream itself is invalid at this point.
    #[error("inflate stream error: {0}")]
    Stream(#[from] flate2::DecompressError),

    /// The stream did not report `Ok` — output didn't fit, or the stream
    /// ended where a sync-flushed record boundary was expected.
    #[error("inflate finished with unexpected status {0:?}")]
    BadStatus(Status),
}

/// Stateful raw-DEFLATE decompressor, one per archive reader.
#[derive(Debug)]
pub struct InflateEngine {
    stream: Decompress,
}

impl InflateEngine {
    /// Creates a fresh decompressor with no history window.
    pub fn new() -> Self {
        InflateEngine {
            // false = raw deflate, no zlib wrapper
            stream: Decompress::new(false),
        }
    }

    /// Inflates one record's compressed bytes.
    ///
    /// `capacity` bounds the plaintext size (the format caps records, so
    /// the bound is known to callers). Returns the inflated bytes; the
    /// stream's history window carries over into the next call.
    pub fn decompress(&mut self, input: &[u8], capacity: usize) -> Result<Vec<u8>, InflateError> {
        let mut out = vec![0u8; capacity];
        let before = self.stream.total_out();
        let status = self
            .stream
            .decompress(input, &mut out, FlushDecompress::Sync)?;
        if status != Status::Ok {
            return Err(InflateError::BadStatus(status));
        }
        let produced = (self.stream.total_out() - before) as usize;
        out.truncate(produced);
        Ok(out)
    }

    /// Discards all stream state, as if freshly constructed.
    ///
    /// Not used between records of one archive — only when a caller wants
    /// to reuse the allocation for a different archive.
    pub fn reset(&mut self) {
        self.stream.reset(false);
    }
}

impl Default for InflateEngine {
    fn default() -> Self {
        Self::new()
    }
}
