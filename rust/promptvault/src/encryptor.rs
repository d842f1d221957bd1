//! Build-time sealing of the payload into a [`CipherBlob`].

use crate::blob::CipherBlob;
use crate::config::ArtifactFormat;
use crate::crypto::{AeadImpl, Aes256GcmAead};
use crate::error::{Error, Result};
use crate::key::EncryptionKey;
use crate::unit::UnitImage;
use log::{info, warn};
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

/// Seals `plaintext` under `key` with a fresh random nonce.
///
/// `key` must be exactly 32 bytes.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<CipherBlob> {
    let key = EncryptionKey::from_slice(key)?;
    Encryptor::new(key).seal(plaintext)
}

/// Opens a blob produced by [`encrypt`]. Tampering or a wrong key is
/// `AuthenticationFailure`; no partial plaintext is ever returned.
pub fn decrypt(blob: &CipherBlob, key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let key = EncryptionKey::from_slice(key)?;
    Aes256GcmAead::new().open(blob.as_bytes(), &key)
}

/// Summary of an [`Encryptor::encrypt_file`] run. Sizes only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealReport {
    pub plaintext_len: usize,
    pub artifact_len: usize,
    pub source_removed: bool,
}

/// Produces sealed artifacts.
#[derive(Debug, Clone)]
pub struct Encryptor {
    key: EncryptionKey,
    aead: Aes256GcmAead,
    format: ArtifactFormat,
    remove_source: bool,
}

impl Encryptor {
    pub fn new(key: EncryptionKey) -> Self {
        Self {
            key,
            aead: Aes256GcmAead::new(),
            format: ArtifactFormat::Raw,
            remove_source: false,
        }
    }

    /// Seal the payload raw (default) or wrapped in a provider unit image.
    pub fn with_format(mut self, format: ArtifactFormat) -> Self {
        self.format = format;
        self
    }

    /// Delete the plaintext source file after a successful seal.
    pub fn with_remove_source(mut self, remove: bool) -> Self {
        self.remove_source = remove;
        self
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<CipherBlob> {
        let sealed = match self.format {
            ArtifactFormat::Raw => self.aead.seal(plaintext, &self.key)?,
            ArtifactFormat::Unit => {
                let image = UnitImage::with_accessor(plaintext).encode()?;
                self.aead.seal(&image, &self.key)?
            }
        };
        metrics::increment_counter!("promptvault.seal.count");
        CipherBlob::from_bytes(sealed)
    }

    /// Seals `plaintext` and atomically replaces `output` with the result.
    pub fn seal_to_file(&self, plaintext: &[u8], output: &Path) -> Result<CipherBlob> {
        let blob = self.seal(plaintext)?;
        blob.write(output)?;
        Ok(blob)
    }

    /// Reads `input`, seals it into `output`, and wipes the plaintext copy.
    pub fn encrypt_file(&self, input: &Path, output: &Path) -> Result<SealReport> {
        let plaintext = Zeroizing::new(fs::read(input).map_err(|e| {
            Error::io(format!("reading plaintext source {}", input.display()), &e)
        })?);

        let blob = self.seal_to_file(&plaintext, output)?;
        let plaintext_len = plaintext.len();
        drop(plaintext);

        let source_removed = self.remove_source
            && match fs::remove_file(input) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "sealed artifact written but plaintext source {} was not removed: {e}",
                        input.display()
                    );
                    false
                }
            };

        info!(
            "sealed {} as {} ({:?} format, {} bytes)",
            input.display(),
            output.display(),
            self.format,
            blob.len()
        );
        Ok(SealReport {
            plaintext_len,
            artifact_len: blob.len(),
            source_removed,
        })
    }
}
