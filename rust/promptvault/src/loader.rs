use crate::blob::CipherBlob;
use crate::crypto::{AeadImpl, Aes256GcmAead};
use crate::error::{Error, Result};
use crate::key::EncryptionKey;
use crate::provider::{Activator, ProviderHandle};
use log::{debug, info};
use securememory::ProtectedBuffer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Outcome of one successful load: the handle and the protected secret.
#[derive(Debug, Clone)]
pub struct LoadedSecret {
    pub handle: ProviderHandle,
    pub buffer: ProtectedBuffer,
}

/// Locates, decrypts and activates the sealed artifact.
///
/// Every call to [`Loader::load`] runs the whole pipeline; caching is the
/// job of the [`crate::Vault`].
pub struct Loader {
    artifact: PathBuf,
    key: EncryptionKey,
    aead: Aes256GcmAead,
    activator: Arc<dyn Activator>,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("artifact", &self.artifact)
            .field("activator", &self.activator.name())
            .finish_non_exhaustive()
    }
}

impl Loader {
    pub fn new(artifact: impl Into<PathBuf>, key: EncryptionKey, activator: Arc<dyn Activator>) -> Self {
        Self {
            artifact: artifact.into(),
            key,
            aead: Aes256GcmAead::new(),
            activator,
        }
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    pub fn load(&self) -> Result<LoadedSecret> {
        let start = Instant::now();
        metrics::increment_counter!("promptvault.load.attempts");

        let result = self.run();
        if result.is_err() {
            metrics::increment_counter!("promptvault.load.failures");
        }
        metrics::histogram!(
            "promptvault.load.duration_seconds",
            start.elapsed().as_secs_f64()
        );
        result
    }

    fn run(&self) -> Result<LoadedSecret> {
        if !self.artifact.is_file() {
            return Err(Error::NotFound {
                path: self.artifact.clone(),
            });
        }

        let blob = CipherBlob::read(&self.artifact)?;
        debug!(
            "read {} byte artifact from {}",
            blob.len(),
            self.artifact.display()
        );

        let decrypted = self.aead.open(blob.as_bytes(), &self.key)?;
        debug!("artifact authenticated, activating via {}", self.activator.name());

        let activated = self.activator.activate(decrypted)?;
        let secret = activated.provider.secret()?;
        let secret_len = secret.len();

        let buffer = ProtectedBuffer::from_zeroizing(secret)?;
        let handle = ProviderHandle::new(self.activator.name(), activated.symbol, secret_len);

        info!(
            "loaded {} byte secret from {} into protected memory (locked: {})",
            secret_len,
            self.artifact.display(),
            buffer.is_locked()
        );
        Ok(LoadedSecret { handle, buffer })
    }
}
