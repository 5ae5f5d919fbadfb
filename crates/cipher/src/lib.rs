//! # Cipher — per-record key agreement and decryption
//!
//! Encrypted archives never store a symmetric key. Each record carries a
//! fresh 16-byte IV and the writer's ephemeral secp256k1 public key; the
//! reader holds the matching static server private key and re-derives the
//! record's AES key by ECDH:
//!
//! ```text
//! shared = server_private · client_ephemeral_public   (curve point)
//! aes_key = shared.x[..16]                            (128-bit truncation)
//! plaintext = AES-128-CFB-decrypt(aes_key, iv, payload)
//! ```
//!
//! Derivation is repeated for every record by design — there is no session
//! state, and derived keys are never cached. CFB is a stream construction,
//! so ciphertext and plaintext lengths are identical and no padding exists.

use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use aes::Aes128;
use k256::ecdh;
use k256::elliptic_curve::generic_array::GenericArray;
use k256::elliptic_curve::sec1::FromEncodedPoint;
use k256::{EncodedPoint, PublicKey, SecretKey};

use thiserror::Error;

type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;

/// Server private key: 32 raw bytes, arriving as a 64-char hex string.
pub const SERVER_KEY_HEX_LEN: usize = 64;

/// Derived AES key width: the first 16 bytes of the shared secret.
pub const AES_KEY_LEN: usize = 16;

/// A cryptographic primitive rejected its input.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The server key string is not exactly 64 hex characters.
    #[error("server private key must be {SERVER_KEY_HEX_LEN} hex characters, got {0}")]
    KeyLength(usize),

    /// The server key string contains non-hex characters.
    #[error("server private key is not valid hex: {0}")]
    KeyEncoding(#[from] hex::FromHexError),

    /// The decoded server key is zero or not below the curve order.
    #[error("server private key is not a valid secp256k1 scalar")]
    KeyScalar,

    /// The record's embedded client key is not a point on secp256k1.
    #[error("client ephemeral key is not a point on the curve")]
    BadPoint,

    /// The AES-CFB construction rejected the derived key or IV.
    #[error("cipher initialization failed")]
    CipherInit,
}

/// Holds the static server private key and derives per-record AES keys.
///
/// One instance lives for the whole archive; everything per-record (client
/// key, IV, derived AES key) is transient and dropped after each call.
#[derive(Debug)]
pub struct RecordCipher {
    secret: SecretKey,
}

impl RecordCipher {
    /// Parses the caller-supplied hex private key.
    ///
    /// The key must be exactly [`SERVER_KEY_HEX_LEN`] hex characters
    /// decoding to a valid big-endian secp256k1 scalar; anything else is
    /// rejected before any archive byte is interpreted.
    pub fn from_hex(key: &str) -> Result<Self, CipherError> {
        if key.len() != SERVER_KEY_HEX_LEN {
            return Err(CipherError::KeyLength(key.len()));
        }
        let bytes = hex::decode(key)?;
        let secret = SecretKey::from_slice(&bytes).map_err(|_| CipherError::KeyScalar)?;
        Ok(RecordCipher { secret })
    }

    /// Derives one record's AES key from its embedded ephemeral client key.
    ///
    /// `client_key` is the raw on-disk form: two 32-byte big-endian affine
    /// coordinates `(x, y)`. The shared secret's x-coordinate, truncated to
    /// 16 bytes, is the key.
    pub fn derive_key(&self, client_key: &[u8; 64]) -> Result<[u8; AES_KEY_LEN], CipherError> {
        let x = GenericArray::from_slice(&client_key[..32]);
        let y = GenericArray::from_slice(&client_key[32..]);
        let point = EncodedPoint::from_affine_coordinates(x, y, false);
        let public = Option::<PublicKey>::from(PublicKey::from_encoded_point(&point))
            .ok_or(CipherError::BadPoint)?;

        let shared = ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), public.as_affine());
        let mut key = [0u8; AES_KEY_LEN];
        key.copy_from_slice(&shared.raw_secret_bytes()[..AES_KEY_LEN]);
        Ok(key)
    }

    /// Decrypts one record's payload in place.
    ///
    /// AES-128 in CFB mode with full-block feedback; no padding, so the
    /// payload keeps its length.
    pub fn decrypt_record(
        &self,
        client_key: &[u8; 64],
        iv: &[u8; 16],
        payload: &mut [u8],
    ) -> Result<(), CipherError> {
        let key = self.derive_key(client_key)?;
        let decryptor =
            Aes128CfbDec::new_from_slices(&key, iv).map_err(|_| CipherError::CipherInit)?;
        decryptor.decrypt(payload);
        Ok(())
    }
}
