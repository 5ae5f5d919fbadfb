//! Fixed header parsing: magic validation and version dispatch.

use cursor::ByteCursor;
use format::{Version, MAGIC, SYNC_MARKER};

use crate::ArchiveError;

/// The archive's parsed header, held for the reader's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Format generation, fixed at archive creation.
    pub version: Version,
    /// Producer-supplied identifier stored by the writer.
    pub proto_name: String,
}

/// Reads the fixed header prefix shared by every generation: the 4-byte
/// magic constant and the version byte that selects the decoder variant.
pub(crate) fn read_magic_and_version(cursor: &mut ByteCursor) -> Result<Version, ArchiveError> {
    let magic = cursor.read_exact(MAGIC.len())?;
    if magic != MAGIC {
        return Err(ArchiveError::Corrupt("magic number mismatch"));
    }
    let code = cursor.read_u8()?;
    Version::from_code(code).ok_or(ArchiveError::UnsupportedVersion(code))
}

/// Reads the length-prefixed proto name and the header's sync marker copy.
/// Both header tails end this way; a marker mismatch here means the file is
/// damaged from the start.
///
/// The name is decoded leniently — the writer stores raw bytes and nothing
/// downstream depends on well-formed UTF-8.
pub(crate) fn read_name_and_marker(cursor: &mut ByteCursor) -> Result<String, ArchiveError> {
    let name_len = cursor.read_u16_le()? as usize;
    let name = String::from_utf8_lossy(cursor.read_exact(name_len)?).into_owned();

    let marker = cursor.read_exact(SYNC_MARKER.len())?;
    if marker != SYNC_MARKER {
        return Err(ArchiveError::Corrupt("header sync marker mismatch"));
    }
    Ok(name)
}
