//! AES-256-GCM field encryption at rest.
//!
//! This module is intentionally free of HTTP and storage dependencies. The
//! persistence layer calls [`FieldCipher::encrypt`] immediately before writing
//! a title or message body and [`FieldCipher::decrypt`] immediately after
//! reading one.
//!
//! # Stored format
//!
//! ```text
//! base64( iv[16] || tag[16] || ciphertext[n] )
//! ```
//!
//! There is no marker distinguishing an envelope from legacy plaintext;
//! decryption falls back to the stored string whenever the value does not
//! decode and authenticate.

pub mod cipher;
pub mod field;

pub use cipher::{
    CipherError, Envelope, IV_LEN, KEY_LEN, MIN_ENCODED_LEN, MIN_ENVELOPE_LEN, TAG_LEN,
};
pub use field::{looks_encrypted, Decryption, FieldCipher};
