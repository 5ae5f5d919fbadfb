//! Write-side fabricators: build archive byte images the way the producer
//! would, so the reader can be exercised against realistic input.

use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use flate2::{Compress, Compression, FlushCompress};
use format::{CompressMode, EncryptMode, ModeSet, MAGIC, SYNC_MARKER};
use k256::ecdh;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};

use crate::ArchiveReader;

type Aes128CfbEnc = cfb_mode::Encryptor<aes::Aes128>;

/// Static server private key used by every encrypted fixture.
pub const SERVER_KEY_HEX: &str = "6b2f1e3d4c5a0918273645f0e1d2c3b4a5968778695a4b3c2d1e0f1029384756";

/// A different (still valid) key, for wrong-key scenarios.
pub fn wrong_key_hex() -> String {
    "77".repeat(32)
}

pub fn server_public() -> PublicKey {
    let bytes = hex::decode(SERVER_KEY_HEX).unwrap();
    SecretKey::from_slice(&bytes).unwrap().public_key()
}

/// Writer-side ECDH: ephemeral client secret against the server's public
/// key; first 16 bytes of the shared x-coordinate.
pub fn writer_key(client: &SecretKey, server: &PublicKey) -> [u8; 16] {
    let shared = ecdh::diffie_hellman(client.to_nonzero_scalar(), server.as_affine());
    let mut key = [0u8; 16];
    key.copy_from_slice(&shared.raw_secret_bytes()[..16]);
    key
}

/// The on-disk form of a public key: raw big-endian x || y.
pub fn raw_coordinates(public: &PublicKey) -> [u8; 64] {
    let point = public.to_encoded_point(false);
    let mut raw = [0u8; 64];
    raw[..32].copy_from_slice(point.x().unwrap());
    raw[32..].copy_from_slice(point.y().unwrap());
    raw
}

/// Deflates `data` as one sync-flushed chunk of an ongoing raw stream,
/// exactly as the writer emits compressed record payloads.
pub fn deflate_sync(stream: &mut Compress, data: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; data.len() + 128];
    let before = stream.total_out();
    stream
        .compress(data, &mut out, FlushCompress::Sync)
        .unwrap();
    out.truncate((stream.total_out() - before) as usize);
    out
}

/// Builds v3 archives: archive-wide mode byte in the header, records are
/// just length + payload + marker.
pub struct V3Builder {
    buf: Vec<u8>,
    compressor: Option<Compress>,
}

impl V3Builder {
    pub fn new(proto: &str, compress: CompressMode) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(0x03);
        buf.push(
            ModeSet {
                compress,
                encrypt: EncryptMode::None,
            }
            .to_header_byte(),
        );
        buf.extend_from_slice(&(proto.len() as u16).to_le_bytes());
        buf.extend_from_slice(proto.as_bytes());
        buf.extend_from_slice(&SYNC_MARKER);

        let compressor = match compress {
            CompressMode::Zlib => Some(Compress::new(Compression::best(), false)),
            CompressMode::None => None,
        };
        V3Builder { buf, compressor }
    }

    /// Appends one record, compressing through the archive's shared stream
    /// when the archive mode says so.
    pub fn record(mut self, payload: &[u8]) -> Self {
        let stored = match self.compressor.as_mut() {
            Some(stream) => deflate_sync(stream, payload),
            None => payload.to_vec(),
        };
        self.framed(&stored)
    }

    /// Appends arbitrary bytes with no framing — for crafting damage.
    pub fn raw_bytes(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    fn framed(mut self, stored: &[u8]) -> Self {
        self.buf
            .extend_from_slice(&(stored.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(stored);
        self.buf.extend_from_slice(&SYNC_MARKER);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Builds v4 archives: per-record mode bytes, per-record key material for
/// encrypted records, one shared DEFLATE stream for compressed ones.
pub struct V4Builder {
    buf: Vec<u8>,
    compressor: Compress,
    server: PublicKey,
    record_index: u8,
}

impl V4Builder {
    pub fn new(proto: &str) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(0x04);
        buf.extend_from_slice(&(proto.len() as u16).to_le_bytes());
        buf.extend_from_slice(proto.as_bytes());
        buf.extend_from_slice(&SYNC_MARKER);
        V4Builder {
            buf,
            compressor: Compress::new(Compression::best(), false),
            server: server_public(),
            record_index: 0,
        }
    }

    pub fn record(mut self, payload: &[u8], compress: CompressMode, encrypt: EncryptMode) -> Self {
        self.buf.push(
            ModeSet { compress, encrypt }.to_record_byte(),
        );

        let mut stored = match compress {
            CompressMode::Zlib => deflate_sync(&mut self.compressor, payload),
            CompressMode::None => payload.to_vec(),
        };

        if encrypt == EncryptMode::Aes {
            // Fresh ephemeral key and IV per record, derived from the
            // record index so fixtures stay deterministic.
            let client = SecretKey::from_slice(&[0x40 + self.record_index; 32]).unwrap();
            let iv = [0x10 + self.record_index; 16];
            let key = writer_key(&client, &self.server);
            Aes128CfbEnc::new_from_slices(&key, &iv)
                .unwrap()
                .encrypt(&mut stored);

            self.buf.extend_from_slice(&iv);
            self.buf
                .extend_from_slice(&raw_coordinates(&client.public_key()));
        }

        self.buf
            .extend_from_slice(&(stored.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(&stored);
        self.buf.extend_from_slice(&SYNC_MARKER);
        self.record_index += 1;
        self
    }

    pub fn plain(self, payload: &[u8]) -> Self {
        self.record(payload, CompressMode::None, EncryptMode::None)
    }

    pub fn zlib(self, payload: &[u8]) -> Self {
        self.record(payload, CompressMode::Zlib, EncryptMode::None)
    }

    pub fn aes(self, payload: &[u8]) -> Self {
        self.record(payload, CompressMode::None, EncryptMode::Aes)
    }

    pub fn aes_zlib(self, payload: &[u8]) -> Self {
        self.record(payload, CompressMode::Zlib, EncryptMode::Aes)
    }

    /// Appends arbitrary bytes with no framing — for crafting damage.
    pub fn raw_bytes(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads every record to clean end-of-stream, panicking on any error.
pub fn read_all(mut reader: ArchiveReader) -> Vec<Vec<u8>> {
    let mut records = Vec::new();
    while let Some(record) = reader.read_next().unwrap() {
        records.push(record);
    }
    records
}
