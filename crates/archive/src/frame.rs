//! Per-record frame decoding, one state machine per format generation.
//!
//! The decoder variant is selected once at header-parse time and owns all
//! the mutable state a generation needs: the archive-wide mode set (v3),
//! the optional record cipher (v4), and the DEFLATE stream shared by every
//! compressed record of the archive.

use cipher::RecordCipher;
use cursor::{ByteCursor, Truncated};
use format::{
    record_prefix_len, CompressMode, EncryptMode, ModeSet, Version, CLIENT_KEY_LEN, IV_LEN,
    LENGTH_BYTES, MAX_PAYLOAD_LEN, SYNC_MARKER,
};
use inflate::InflateEngine;

use crate::header::read_name_and_marker;
use crate::{ArchiveError, RecordError};

/// Smallest stored v3 record: length field, one payload byte, marker.
const V3_MIN_RECORD: usize = LENGTH_BYTES + 1 + SYNC_MARKER.len();

/// Smallest stored v4 record: mode byte, length field, one payload byte,
/// marker.
const V4_MIN_RECORD: usize = 1 + LENGTH_BYTES + 1 + SYNC_MARKER.len();

/// Version-specific record decoder, selected by the header's version byte.
#[derive(Debug)]
pub(crate) enum FrameDecoder {
    V3(V3Decoder),
    V4(V4Decoder),
}

impl FrameDecoder {
    pub(crate) fn new(version: Version, cipher: Option<RecordCipher>) -> Self {
        match version {
            Version::Recovery => FrameDecoder::V3(V3Decoder::new()),
            Version::Cipher => FrameDecoder::V4(V4Decoder::new(cipher)),
        }
    }

    /// Consumes the version-specific remainder of the header, returning the
    /// proto name. Called exactly once, immediately after version dispatch.
    pub(crate) fn read_header_tail(
        &mut self,
        cursor: &mut ByteCursor,
    ) -> Result<String, ArchiveError> {
        match self {
            FrameDecoder::V3(decoder) => {
                let byte = cursor.read_u8()?;
                decoder.modes = ModeSet::from_header_byte(byte)
                    .ok_or(ArchiveError::Corrupt("invalid header mode byte"))?;
                read_name_and_marker(cursor)
            }
            FrameDecoder::V4(_) => read_name_and_marker(cursor),
        }
    }

    /// Decodes the next record, `Ok(None)` at clean end-of-stream.
    pub(crate) fn read_record(
        &mut self,
        cursor: &mut ByteCursor,
    ) -> Result<Option<Vec<u8>>, ArchiveError> {
        match self {
            FrameDecoder::V3(decoder) => decoder.read_record(cursor),
            FrameDecoder::V4(decoder) => decoder.read_record(cursor),
        }
    }
}

/// v3: archive-wide modes from the header, no per-record key material.
#[derive(Debug)]
pub(crate) struct V3Decoder {
    modes: ModeSet,
    inflater: InflateEngine,
}

impl V3Decoder {
    fn new() -> Self {
        V3Decoder {
            modes: ModeSet {
                compress: CompressMode::None,
                encrypt: EncryptMode::None,
            },
            inflater: InflateEngine::new(),
        }
    }

    fn read_record(&mut self, cursor: &mut ByteCursor) -> Result<Option<Vec<u8>>, ArchiveError> {
        if cursor.remaining() < V3_MIN_RECORD {
            return Ok(None);
        }

        let length = cursor.read_u16_le()?;
        let payload = read_payload(cursor, length)?;

        let payload = match self.modes.compress {
            CompressMode::Zlib => self
                .inflater
                .decompress(&payload, MAX_PAYLOAD_LEN as usize)
                .map_err(|e| record_failed(cursor, RecordError::Inflate(e)))?,
            CompressMode::None => payload,
        };

        read_record_marker(cursor)?;
        Ok(Some(payload))
    }
}

/// v4: per-record modes, per-record key material, optional cipher.
#[derive(Debug)]
pub(crate) struct V4Decoder {
    cipher: Option<RecordCipher>,
    inflater: InflateEngine,
}

impl V4Decoder {
    fn new(cipher: Option<RecordCipher>) -> Self {
        V4Decoder {
            cipher,
            inflater: InflateEngine::new(),
        }
    }

    fn read_record(&mut self, cursor: &mut ByteCursor) -> Result<Option<Vec<u8>>, ArchiveError> {
        if cursor.remaining() < V4_MIN_RECORD {
            return Ok(None);
        }

        let mode_byte = cursor.read_u8()?;
        let modes = ModeSet::from_record_byte(mode_byte)
            .ok_or_else(|| record_failed(cursor, RecordError::InvalidMode(mode_byte)))?;

        let encrypted = modes.encrypt == EncryptMode::Aes;
        if encrypted && self.cipher.is_none() {
            tracing::warn!(
                position = cursor.position(),
                "encrypted record but cipher not ready"
            );
            return Err(ArchiveError::CipherNotReady);
        }

        let mut iv = [0u8; IV_LEN];
        let mut client_key = [0u8; CLIENT_KEY_LEN];
        if encrypted {
            // The whole key-material prefix plus a minimal payload frame
            // must still fit, otherwise this is a truncated tail record.
            // The mode byte of the prefix is already consumed.
            let needed = record_prefix_len(true) - 1 + LENGTH_BYTES + 1 + SYNC_MARKER.len();
            if cursor.remaining() < needed {
                return Err(Truncated {
                    needed,
                    remaining: cursor.remaining(),
                }
                .into());
            }
            iv.copy_from_slice(cursor.read_exact(IV_LEN)?);
            client_key.copy_from_slice(cursor.read_exact(CLIENT_KEY_LEN)?);
        }

        let length = cursor.read_u16_le()?;
        let mut payload = read_payload(cursor, length)?;

        if encrypted {
            // Checked above; split borrow keeps the inflater usable below.
            if let Some(record_cipher) = self.cipher.as_ref() {
                record_cipher
                    .decrypt_record(&client_key, &iv, &mut payload)
                    .map_err(|e| record_failed(cursor, RecordError::Decrypt(e)))?;
            }
        }

        let payload = match modes.compress {
            CompressMode::Zlib => self
                .inflater
                .decompress(&payload, MAX_PAYLOAD_LEN as usize)
                .map_err(|e| record_failed(cursor, RecordError::Inflate(e)))?,
            CompressMode::None => payload,
        };

        read_record_marker(cursor)?;
        Ok(Some(payload))
    }
}

/// Validates the length field and reads the stored payload.
///
/// A zero or oversized length is a recoverable record error that leaves the
/// cursor *before* the payload bytes: their true extent is unknown, so the
/// caller decides whether to abort or scan forward for the next marker.
fn read_payload(cursor: &mut ByteCursor, length: u16) -> Result<Vec<u8>, ArchiveError> {
    if length == 0 || length > MAX_PAYLOAD_LEN {
        return Err(record_failed(cursor, RecordError::InvalidLength(length)));
    }
    let length = length as usize;

    // Refuse to start a record that cannot finish: payload and marker must
    // both be present before the payload is consumed.
    let needed = length + SYNC_MARKER.len();
    if cursor.remaining() < needed {
        return Err(Truncated {
            needed,
            remaining: cursor.remaining(),
        }
        .into());
    }
    Ok(cursor.read_exact(length)?.to_vec())
}

/// Reads and validates one record's trailing sync marker.
fn read_record_marker(cursor: &mut ByteCursor) -> Result<(), ArchiveError> {
    let marker = cursor.read_exact(SYNC_MARKER.len())?;
    if marker != SYNC_MARKER {
        return Err(record_failed(cursor, RecordError::MarkerMismatch));
    }
    Ok(())
}

/// Tags a record-level rejection with its archive offset before returning
/// it to the caller.
fn record_failed(cursor: &ByteCursor, error: RecordError) -> ArchiveError {
    tracing::warn!(position = cursor.position(), %error, "record rejected");
    ArchiveError::Record(error)
}
