//! [`FieldCipher`]: encrypt-before-write / decrypt-after-read for string fields.
//!
//! Neither direction ever fails from the caller's point of view. A failed
//! encryption stores the plaintext; a failed decryption returns the stored
//! string unchanged, which is what legacy unencrypted rows need.

use tracing::{debug, warn};

use super::cipher::{
    build_cipher, open, seal, Aes256Gcm16, CipherError, Envelope, MIN_ENCODED_LEN,
};
use crate::keys::FieldKey;

/// Outcome of [`FieldCipher::decrypt_checked`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decryption {
    /// The input was a valid envelope and authenticated under the key.
    Decrypted(String),
    /// The input was returned as-is: passthrough mode, legacy plaintext, or a
    /// value that failed to decode or authenticate.
    PassedThrough(String),
}

impl Decryption {
    /// The resulting field value, whichever way it was produced.
    pub fn into_string(self) -> String {
        match self {
            Decryption::Decrypted(s) | Decryption::PassedThrough(s) => s,
        }
    }

    /// Borrow the resulting field value.
    pub fn as_str(&self) -> &str {
        match self {
            Decryption::Decrypted(s) | Decryption::PassedThrough(s) => s,
        }
    }

    /// Returns `true` if the value came out of a real envelope.
    pub fn was_decrypted(&self) -> bool {
        matches!(self, Decryption::Decrypted(_))
    }
}

/// Process-wide field encryptor, built once at startup and shared by reference.
///
/// Holds either an initialised AES-256-GCM cipher or nothing (passthrough
/// mode). Cheap to clone; calls take `&self` and touch no shared mutable state.
#[derive(Clone)]
pub struct FieldCipher {
    aead: Option<Aes256Gcm16>,
}

impl FieldCipher {
    /// Build a cipher from an optional key. `None` selects passthrough mode.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if the key cannot initialise
    /// AES-256 (unreachable for a [`FieldKey`]).
    pub fn new(key: Option<&FieldKey>) -> Result<Self, CipherError> {
        let aead = key.map(|k| build_cipher(k.as_bytes())).transpose()?;
        Ok(Self { aead })
    }

    /// A cipher with encryption disabled.
    pub fn passthrough() -> Self {
        Self { aead: None }
    }

    /// Returns `true` if a key is loaded.
    pub fn is_enabled(&self) -> bool {
        self.aead.is_some()
    }

    /// Encrypt `plaintext` into a stored envelope string.
    ///
    /// Empty input and passthrough mode return the input unchanged. An AEAD
    /// failure also returns the plaintext, trading confidentiality for
    /// availability of the write path.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let Some(aead) = &self.aead else {
            return plaintext.to_owned();
        };
        if plaintext.is_empty() {
            return String::new();
        }
        match seal(aead, plaintext.as_bytes()) {
            Ok(envelope) => envelope.encode(),
            Err(e) => {
                warn!(error = %e, "field encryption failed; storing value unencrypted");
                plaintext.to_owned()
            }
        }
    }

    /// Encrypt `value` unless it already looks like an envelope.
    ///
    /// Guards repeated saves of the same record against double encryption.
    /// See [`looks_encrypted`] for the (approximate) test.
    pub fn encrypt_unless_sealed(&self, value: &str) -> String {
        if looks_encrypted(value) {
            return value.to_owned();
        }
        self.encrypt(value)
    }

    /// Decrypt a stored field, falling back to the stored string on any failure.
    pub fn decrypt(&self, stored: &str) -> String {
        self.decrypt_checked(stored).into_string()
    }

    /// Decrypt a stored field and report whether a real envelope was opened.
    pub fn decrypt_checked(&self, stored: &str) -> Decryption {
        let Some(aead) = &self.aead else {
            return Decryption::PassedThrough(stored.to_owned());
        };
        if stored.is_empty() {
            return Decryption::PassedThrough(String::new());
        }
        match try_decrypt(aead, stored) {
            Ok(plaintext) => Decryption::Decrypted(plaintext),
            Err(e) => {
                debug!(reason = %e, "field not decrypted; returning stored value");
                Decryption::PassedThrough(stored.to_owned())
            }
        }
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.is_enabled() { "enabled" } else { "passthrough" };
        f.debug_struct("FieldCipher").field("mode", &mode).finish()
    }
}

fn try_decrypt(aead: &Aes256Gcm16, stored: &str) -> Result<String, CipherError> {
    let envelope = Envelope::decode(stored)?;
    let bytes = open(aead, &envelope)?;
    String::from_utf8(bytes).map_err(|_| CipherError::InvalidUtf8)
}

/// Heuristic: does `value` look like an envelope this module produced?
///
/// True iff every character is in the standard base64 alphabet (padding
/// included) and the string is at least [`MIN_ENCODED_LEN`] characters.
/// Plaintext that happens to be long and base64-shaped is misclassified.
pub fn looks_encrypted(value: &str) -> bool {
    value.len() >= MIN_ENCODED_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}
