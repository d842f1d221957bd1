use crate::error::Result;
use crate::key::EncryptionKey;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// Seam between the sealing/loading pipeline and a concrete AEAD.
pub trait AeadImpl: Send + Sync {
    /// Seals `plaintext` under a fresh random nonce and returns
    /// `nonce || ciphertext || tag`.
    fn seal(&self, plaintext: &[u8], key: &EncryptionKey) -> Result<Vec<u8>>;

    /// Opens `nonce || ciphertext || tag`; all-or-nothing.
    fn open(&self, sealed: &[u8], key: &EncryptionKey) -> Result<Zeroizing<Vec<u8>>>;
}

pub const GCM_NONCE_SIZE: usize = 12;
pub const GCM_TAG_SIZE: usize = 16;

// ((1 << 32) - 2) * block size
pub(crate) const GCM_MAX_DATA_SIZE: u64 = ((1_u64 << 32) - 2) * 16;

/// Fills a buffer from the OS CSPRNG
pub fn fill_random(buffer: &mut [u8]) {
    OsRng.fill_bytes(buffer);
}
