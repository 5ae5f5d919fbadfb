//! # Archive — offline reader for log archive files
//!
//! Decodes the append-only archive files produced by the high-throughput
//! log writer. An archive is a header followed by a run of framed records,
//! each terminated by a fixed 8-byte synchronization marker:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ magic (4) = 1B AD C0 DE │ version (1) = 0x3 | 0x4           │
//! ├─────────────────────────────────────────────────────────────┤
//! │ v3 only: archive-wide mode byte (1)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ proto name length (u16 LE) │ proto name (N)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │ sync marker (8) = B7 DB E7 DB 80 AD D9 57                   │
//! ╞═════════════════════════════════════════════════════════════╡
//! │ v4 only: record mode byte (1)                               │
//! │ v4 + AES only: IV (16) │ client ephemeral public key (64)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │ payload length (u16 LE, 0 < L ≤ 16384) │ payload (L)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │ sync marker (8)                                             │
//! ╞═════════════════════════════════════════════════════════════╡
//! │ ... more records ...                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! v3 fixes compression/encryption once for the whole archive in its header
//! mode byte (encryption is never available in v3). v4 carries the mode per
//! record, and encrypted records embed the key material needed to re-derive
//! their AES key: ECDH over secp256k1 between the record's ephemeral client
//! key and the caller-supplied static server private key.
//!
//! Zlib-compressed payloads are chunks of a *single* raw-DEFLATE stream
//! that runs across the whole archive (sync-flushed at record boundaries),
//! so records must be decoded in order and share one decompressor.
//!
//! ## Errors
//!
//! Header-level problems ([`ArchiveError::Corrupt`],
//! [`ArchiveError::UnsupportedVersion`], …) abort [`ArchiveReader::open`];
//! the archive is unusable. Per-record problems come back as
//! [`ArchiveError::Record`] values and poison only that record — the caller
//! can stop, or call [`ArchiveReader::resync`] to skip to the next marker
//! and keep reading.
//!
//! ## Example
//!
//! ```rust,no_run
//! use archive::ArchiveReader;
//!
//! let mut reader = ArchiveReader::open("app-20260807.bin", None).unwrap();
//! while let Some(record) = reader.read_next().unwrap() {
//!     println!("{}", String::from_utf8_lossy(&record));
//! }
//! ```

use thiserror::Error;

mod frame;
mod header;
mod reader;

pub use format::{CompressMode, EncryptMode, Version};
pub use header::ArchiveHeader;
pub use reader::ArchiveReader;

/// Errors surfaced while opening or reading an archive.
///
/// Everything except [`Record`](ArchiveError::Record) is fatal for the
/// archive (or, for [`Truncated`](ArchiveError::Truncated), for the current
/// read — the same file may decode further once more bytes arrive).
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The underlying byte source could not be acquired.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A field required more bytes than the archive has.
    #[error("archive truncated: {0}")]
    Truncated(#[from] cursor::Truncated),

    /// Header-level damage: bad magic, bad header mode byte, or a header
    /// sync marker that doesn't match.
    #[error("corrupt archive: {0}")]
    Corrupt(&'static str),

    /// The version byte names no decodable format generation (including
    /// the retired `0x1`/`0x2` formats).
    #[error("unsupported archive version {0:#04x}")]
    UnsupportedVersion(u8),

    /// An encrypted record was found but no server private key was
    /// supplied at open. No record of this archive can ever be decrypted,
    /// so this is fatal rather than per-record.
    #[error("encrypted record but no server private key supplied")]
    CipherNotReady,

    /// The server private key string failed validation at open.
    #[error("invalid server private key: {0}")]
    InvalidServerKey(#[source] cipher::CipherError),

    /// One record was rejected; the stream may continue after a
    /// [`resync`](ArchiveReader::resync).
    #[error("record rejected: {0}")]
    Record(#[from] RecordError),
}

/// Rejection reasons scoped to a single record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A v4 record's mode byte has an unrecognized nibble.
    #[error("unrecognized mode byte {0:#04x}")]
    InvalidMode(u8),

    /// The payload length field is zero or above the 16 KiB bound. The
    /// cursor is left at the unread payload, since its true extent is
    /// unknown.
    #[error("payload length {0} out of range")]
    InvalidLength(u16),

    /// The record's trailing sync marker doesn't match — this record (or
    /// an earlier one) is damaged.
    #[error("sync marker mismatch")]
    MarkerMismatch,

    /// Per-record key derivation or cipher setup failed.
    #[error("decrypt failed: {0}")]
    Decrypt(#[source] cipher::CipherError),

    /// The record's compressed payload doesn't continue the archive's
    /// DEFLATE stream.
    #[error("inflate failed: {0}")]
    Inflate(#[source] inflate::InflateError),
}

#[cfg(test)]
mod tests;
