//! Field key provisioning.
//!
//! # Lifecycle
//!
//! 1. At startup, [`provision`] resolves the `ENCRYPTION_KEY` configuration
//!    value into a [`FieldKey`], or into "no key" when the value is absent.
//! 2. The key is handed to [`crate::crypto::FieldCipher`] once and is never
//!    replaced for the lifetime of the process.
//! 3. A malformed value is fatal: the binary refuses to start rather than run
//!    with an unusable key.
//!
//! # Security invariants
//!
//! - Key bytes are never logged, traced, or printed through `Debug`.
//! - No key means passthrough mode, which is a supported development setup.

pub mod material;

pub use material::{FieldKey, KeyError};

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use tracing::{info, warn};

use crate::crypto::KEY_LEN;

/// Resolve the process-wide field key from its configured hex value.
///
/// `None` or a blank value yields `Ok(None)` (passthrough mode).
///
/// # Errors
///
/// Returns [`KeyError`] if a value is present but is not a 64-character hex
/// string.
pub fn provision(value: Option<&str>) -> Result<Option<FieldKey>, KeyError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            warn!("ENCRYPTION_KEY not set; stored fields will not be encrypted");
            Ok(None)
        }
        Some(hex_value) => {
            let key = FieldKey::from_hex(hex_value)?;
            info!("field encryption key loaded");
            Ok(Some(key))
        }
    }
}

/// Generate a fresh random key and return it hex-encoded (64 characters).
pub fn generate_key_hex() -> String {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    let encoded = hex::encode(key);
    key.iter_mut().for_each(|b| *b = 0);
    encoded
}
