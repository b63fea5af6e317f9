//! [`FieldKey`]: the in-memory field encryption key and its parsing rules.

use thiserror::Error;

use crate::crypto::KEY_LEN;

/// Errors produced while provisioning the field key.
///
/// Messages never echo any part of the configured value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The configured value is not a valid hexadecimal string.
    #[error("ENCRYPTION_KEY is not valid hex")]
    InvalidHex,

    /// The decoded key material has an unexpected length.
    #[error("ENCRYPTION_KEY has invalid length: expected {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// When this type is dropped, the memory is overwritten with zeroes to
/// minimise the window during which plaintext key material lives in RAM.
#[derive(Clone)]
pub struct FieldKey(Box<[u8; KEY_LEN]>);

impl FieldKey {
    /// Parse a 64-character hex string into a key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidHex`] if `value` is not hex, or
    /// [`KeyError::InvalidLength`] if it does not decode to [`KEY_LEN`] bytes.
    pub fn from_hex(value: &str) -> Result<Self, KeyError> {
        let mut decoded = hex::decode(value.trim()).map_err(|_| KeyError::InvalidHex)?;
        let key = Self::from_bytes(&decoded);
        decoded.iter_mut().for_each(|b| *b = 0);
        key
    }

    /// Copy raw key bytes into a new key buffer.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if the slice has the wrong length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidLength(bytes.len()));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for FieldKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material — not even in debug builds.
        f.write_str("FieldKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_hex() {
        let key = FieldKey::from_hex(&"ab".repeat(KEY_LEN)).unwrap();
        assert!(key.as_bytes().iter().all(|b| *b == 0xab));
    }

    #[test]
    fn accepts_uppercase_and_surrounding_whitespace() {
        let key = FieldKey::from_hex(&format!("  {}\n", "0F".repeat(KEY_LEN))).unwrap();
        assert_eq!(key.as_bytes()[0], 0x0f);
    }

    #[test]
    fn rejects_non_hex() {
        let value = "zz".repeat(KEY_LEN);
        assert_eq!(FieldKey::from_hex(&value).unwrap_err(), KeyError::InvalidHex);
    }

    #[test]
    fn rejects_odd_length_hex() {
        assert_eq!(FieldKey::from_hex("abc").unwrap_err(), KeyError::InvalidHex);
    }

    #[test]
    fn rejects_wrong_length() {
        let short = "00".repeat(16);
        assert_eq!(
            FieldKey::from_hex(&short).unwrap_err(),
            KeyError::InvalidLength(16)
        );
        assert!(FieldKey::from_bytes(&[0u8; 33]).is_err());
    }

    #[test]
    fn error_does_not_echo_value() {
        let value = "secretsecret";
        let err = FieldKey::from_hex(value).unwrap_err();
        assert!(!err.to_string().contains(value));
    }

    #[test]
    fn redacted_in_debug() {
        let key = FieldKey::from_bytes(&[0xFF; KEY_LEN]).unwrap();
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("255"));
    }
}
