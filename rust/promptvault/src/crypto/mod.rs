//! Authenticated encryption used for the sealed artifact

mod aead;
pub mod aes256gcm;

pub use aead::{fill_random, AeadImpl, GCM_NONCE_SIZE, GCM_TAG_SIZE};
pub use aes256gcm::Aes256GcmAead;
