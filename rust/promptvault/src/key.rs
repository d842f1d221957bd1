use crate::error::{Error, Result};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

/// Length of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// The symmetric key shared by the sealing step and the loader.
///
/// Wiped on drop. `Debug` never prints the bytes and equality is checked in
/// constant time.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Copies a key from raw bytes; anything but 32 bytes is `InvalidKey`.
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(Error::InvalidKey {
                expected: KEY_SIZE,
                actual: key.len(),
            });
        }
        let mut bytes = [0_u8; KEY_SIZE];
        bytes.copy_from_slice(key);
        Ok(Self { bytes })
    }

    /// Parses a 64-character hex string, surrounding whitespace ignored.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let decoded = Zeroizing::new(hex::decode(encoded).map_err(|_| Error::InvalidKey {
            expected: KEY_SIZE,
            actual: encoded.len() / 2,
        })?);
        Self::from_slice(&decoded)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl PartialEq for EncryptionKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for EncryptionKey {}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        let err = EncryptionKey::from_slice(&KEY[..16]).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidKey {
                expected: 32,
                actual: 16
            }
        );
    }

    #[test]
    fn test_from_hex_matches_raw() {
        let encoded = hex::encode(KEY);
        let from_hex = EncryptionKey::from_hex(&format!("  {encoded}\n")).unwrap();
        assert_eq!(from_hex, EncryptionKey::from_slice(KEY).unwrap());
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(matches!(
            EncryptionKey::from_hex("not hex at all"),
            Err(Error::InvalidKey { .. })
        ));
        assert!(matches!(
            EncryptionKey::from_hex("abcd"),
            Err(Error::InvalidKey { actual: 2, .. })
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = EncryptionKey::from_slice(KEY).unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains("0123"));
        assert!(debug.contains("redacted"));
    }
}
