//! The public archive reader: open, sequential decode, resynchronization.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use cipher::RecordCipher;
use cursor::ByteCursor;
use format::{Version, SYNC_MARKER};

use crate::frame::FrameDecoder;
use crate::header::{read_magic_and_version, ArchiveHeader};
use crate::ArchiveError;

/// Sequential reader over one archive file.
///
/// Owns the cursor, the parsed header, and the version-specific frame
/// decoder (including the DEFLATE stream shared by the archive's
/// compressed records). One instance per archive; instances are fully
/// independent of each other.
///
/// Reading is strictly forward. A rejected record leaves the cursor where
/// decoding stopped; [`resync`](ArchiveReader::resync) scans ahead for the
/// next sync marker when the caller wants to skip the damage and continue.
#[derive(Debug)]
pub struct ArchiveReader {
    cursor: ByteCursor,
    header: ArchiveHeader,
    decoder: FrameDecoder,
}

impl ArchiveReader {
    /// Opens an archive file.
    ///
    /// `server_key` is the hex-encoded static server private key, required
    /// only for v4 archives holding encrypted records. It is validated here
    /// — before any archive byte is interpreted — and shared by nothing:
    /// each reader parses its own copy.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Io`] if the file cannot be read,
    /// [`ArchiveError::InvalidServerKey`] for a malformed key,
    /// [`ArchiveError::Corrupt`] / [`ArchiveError::UnsupportedVersion`] /
    /// [`ArchiveError::Truncated`] for header-level damage.
    pub fn open<P: AsRef<Path>>(path: P, server_key: Option<&str>) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        Self::from_reader(file, server_key)
    }

    /// Opens an archive from any byte source (consumed and released before
    /// this returns).
    pub fn from_reader<R: Read>(source: R, server_key: Option<&str>) -> Result<Self, ArchiveError> {
        Self::from_cursor(ByteCursor::from_reader(source)?, server_key)
    }

    /// Opens an archive already materialized in memory.
    pub fn from_bytes(bytes: Vec<u8>, server_key: Option<&str>) -> Result<Self, ArchiveError> {
        Self::from_cursor(ByteCursor::from_vec(bytes), server_key)
    }

    fn from_cursor(
        mut cursor: ByteCursor,
        server_key: Option<&str>,
    ) -> Result<Self, ArchiveError> {
        let record_cipher = match server_key {
            Some(key) => {
                Some(RecordCipher::from_hex(key).map_err(ArchiveError::InvalidServerKey)?)
            }
            None => None,
        };

        let version = read_magic_and_version(&mut cursor)?;
        let mut decoder = FrameDecoder::new(version, record_cipher);
        let proto_name = decoder.read_header_tail(&mut cursor)?;
        tracing::debug!(?version, proto = %proto_name, "archive opened");

        Ok(ArchiveReader {
            cursor,
            header: ArchiveHeader {
                version,
                proto_name,
            },
            decoder,
        })
    }

    /// Decodes the next record.
    ///
    /// Returns `Ok(Some(plaintext))` for a fully decoded record,
    /// `Ok(None)` at clean end-of-stream. Never returns partial bytes: a
    /// record either decodes completely or comes back as an error.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Record`] for damage scoped to this record (the
    /// stream may continue after [`resync`](ArchiveReader::resync)),
    /// [`ArchiveError::Truncated`] when the record runs past the end of
    /// the file, [`ArchiveError::CipherNotReady`] when an encrypted record
    /// appears and no server key was supplied.
    pub fn read_next(&mut self) -> Result<Option<Vec<u8>>, ArchiveError> {
        self.decoder.read_record(&mut self.cursor)
    }

    /// Scans forward for the next literal sync marker and repositions the
    /// cursor immediately after it — the start of the next candidate
    /// record.
    ///
    /// Returns `true` if a marker was found. When none remains, the cursor
    /// is left untouched and the caller should stop.
    ///
    /// This is deliberately separate from [`read_next`](Self::read_next):
    /// skipping damaged data is caller policy, not decoder policy. Note
    /// that for compressed archives, records skipped this way may leave
    /// the DEFLATE stream without window history that later records
    /// reference; those then fail as inflate errors rather than decoding
    /// wrongly.
    pub fn resync(&mut self) -> bool {
        match self.cursor.find(&SYNC_MARKER) {
            Some(at) => {
                let target = at + SYNC_MARKER.len();
                tracing::debug!(
                    from = self.cursor.position(),
                    to = target,
                    "resynchronized at marker"
                );
                // find() only reports markers inside the unread tail.
                self.cursor.skip(target - self.cursor.position()).is_ok()
            }
            None => {
                tracing::debug!(
                    position = self.cursor.position(),
                    "no sync marker ahead of cursor"
                );
                false
            }
        }
    }

    /// Absolute byte offset of the next unread archive byte.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Producer identifier stored in the header.
    pub fn proto_name(&self) -> &str {
        &self.header.proto_name
    }

    /// Format generation of this archive.
    pub fn version(&self) -> Version {
        self.header.version
    }

    /// Parsed header, available for the reader's whole lifetime.
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Releases the reader and the archive image it owns.
    ///
    /// The backing file handle was already released at open time; this
    /// exists for callers that want an explicit end-of-use point.
    pub fn close(self) {}
}
