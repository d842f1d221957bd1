use crate::crypto::aead::{fill_random, AeadImpl, GCM_MAX_DATA_SIZE, GCM_NONCE_SIZE, GCM_TAG_SIZE};
use crate::error::{Error, Result};
use crate::key::EncryptionKey;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use zeroize::Zeroizing;

/// AES-256-GCM with a random 96-bit nonce per seal and empty associated data.
#[derive(Default, Debug, Clone)]
pub struct Aes256GcmAead;

impl Aes256GcmAead {
    pub fn new() -> Self {
        Self
    }

    fn cipher(key: &EncryptionKey) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| Error::CryptoInit("AES-256-GCM rejected the key length".into()))
    }
}

impl AeadImpl for Aes256GcmAead {
    fn seal(&self, plaintext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
        if plaintext.len() as u64 > GCM_MAX_DATA_SIZE {
            return Err(Error::CryptoInit("payload too large for GCM".into()));
        }

        let cipher = Self::cipher(key)?;

        let mut nonce = [0_u8; GCM_NONCE_SIZE];
        fill_random(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| Error::CryptoInit("AES-256-GCM seal failed".into()))?;

        let mut sealed = Vec::with_capacity(GCM_NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8], key: &EncryptionKey) -> Result<Zeroizing<Vec<u8>>> {
        if sealed.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
            return Err(Error::CorruptData(format!(
                "{} bytes is shorter than nonce and tag ({} bytes)",
                sealed.len(),
                GCM_NONCE_SIZE + GCM_TAG_SIZE
            )));
        }

        let cipher = Self::cipher(key)?;
        let (nonce, ciphertext) = sealed.split_at(GCM_NONCE_SIZE);

        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| Error::AuthenticationFailure)
    }
}
