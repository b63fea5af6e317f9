//! AES-256-GCM sealing and opening of single field envelopes.
//!
//! **Nonce size:** the stored format uses a 16-byte IV, not the 12-byte GCM
//! default. GCM derives its counter block from a non-96-bit IV through GHASH,
//! so envelopes written by other AES-256-GCM implementations with a 16-byte
//! IV interoperate with this one.
//!
//! **Never reuse an IV under the same key.** Every [`seal`] call draws a
//! fresh one from the OS CSPRNG.

use aes_gcm::{
    aead::{
        consts::U16, generic_array::GenericArray, rand_core::RngCore, AeadInPlace, KeyInit, OsRng,
    },
    aes::Aes256,
    AesGcm,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of the per-envelope IV.
pub const IV_LEN: usize = 16;

/// Byte length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Smallest decoded envelope: IV and tag around an empty ciphertext.
pub const MIN_ENVELOPE_LEN: usize = IV_LEN + TAG_LEN;

/// Base64 length of a [`MIN_ENVELOPE_LEN`]-byte envelope (44 characters).
pub const MIN_ENCODED_LEN: usize = MIN_ENVELOPE_LEN.div_ceil(3) * 4;

/// AES-256-GCM with a 128-bit nonce.
pub(crate) type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// A parsed field envelope.
///
/// The stored representation is `base64(iv || tag || ciphertext)` with the
/// standard alphabet and padding. There is no version prefix or marker byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Random IV used for this envelope only.
    pub iv: [u8; IV_LEN],
    /// GCM authentication tag.
    pub tag: [u8; TAG_LEN],
    /// Ciphertext, same length as the plaintext.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode this envelope to its stored string form.
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(MIN_ENVELOPE_LEN + self.ciphertext.len());
        raw.extend_from_slice(&self.iv);
        raw.extend_from_slice(&self.tag);
        raw.extend_from_slice(&self.ciphertext);
        STANDARD.encode(raw)
    }

    /// Parse a stored string back into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidEncoding`] if `s` is not base64, or
    /// [`CipherError::TooShort`] if it decodes to fewer than
    /// [`MIN_ENVELOPE_LEN`] bytes.
    pub fn decode(s: &str) -> Result<Self, CipherError> {
        let raw = STANDARD.decode(s).map_err(|_| CipherError::InvalidEncoding)?;
        if raw.len() < MIN_ENVELOPE_LEN {
            return Err(CipherError::TooShort(raw.len()));
        }
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&raw[..IV_LEN]);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&raw[IV_LEN..MIN_ENVELOPE_LEN]);
        let ciphertext = raw[MIN_ENVELOPE_LEN..].to_vec();
        Ok(Self {
            iv,
            tag,
            ciphertext,
        })
    }
}

/// Errors produced by the cipher layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// AES-GCM encryption failed, or decryption failed authentication.
    #[error("aead operation failed")]
    AeadFailure,

    /// The stored value is not valid base64.
    #[error("envelope is not valid base64")]
    InvalidEncoding,

    /// The stored value decodes to fewer bytes than an IV plus a tag.
    #[error("envelope too short: {0} bytes")]
    TooShort(usize),

    /// The decrypted bytes are not UTF-8.
    #[error("decrypted field is not valid UTF-8")]
    InvalidUtf8,
}

/// Encrypt `plaintext` into a new [`Envelope`] under `cipher`.
///
/// # Errors
///
/// Returns [`CipherError::AeadFailure`] on an internal AEAD error (should be
/// unreachable with a valid key).
pub(crate) fn seal(cipher: &Aes256Gcm16, plaintext: &[u8]) -> Result<Envelope, CipherError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let mut ciphertext = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut ciphertext)
        .map_err(|_| CipherError::AeadFailure)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);
    Ok(Envelope {
        iv,
        tag: tag_bytes,
        ciphertext,
    })
}

/// Decrypt and authenticate an [`Envelope`] back to plaintext bytes.
///
/// # Errors
///
/// Returns [`CipherError::AeadFailure`] if authentication fails (wrong key or
/// tampered data).
pub(crate) fn open(cipher: &Aes256Gcm16, envelope: &Envelope) -> Result<Vec<u8>, CipherError> {
    let mut plaintext = envelope.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(&envelope.iv),
            b"",
            &mut plaintext,
            GenericArray::from_slice(&envelope.tag),
        )
        .map_err(|_| CipherError::AeadFailure)?;
    Ok(plaintext)
}

pub(crate) fn build_cipher(key: &[u8]) -> Result<Aes256Gcm16, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength);
    }
    Aes256Gcm16::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)
}
