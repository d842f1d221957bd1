use crate::config::VaultConfig;
use crate::error::{Error, Result};
use crate::guard::{FailurePolicy, InitGuard, LoadState};
use crate::key::EncryptionKey;
use crate::loader::{LoadedSecret, Loader};
use crate::provider::{Activator, ProviderHandle};
use crate::ArtifactFormat;
use log::{debug, info, warn};
use securememory::ProtectedBuffer;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owns the key, the loader and the once-only cache of the secret.
///
/// The first [`Vault::load_secret`] call decrypts and activates the artifact;
/// concurrent first callers wait for it and share its outcome. Every later
/// call returns the same [`ProtectedBuffer`] without touching disk.
#[derive(Debug)]
pub struct Vault {
    loader: Loader,
    guard: InitGuard<LoadedSecret>,
    purged: AtomicBool,
}

impl Vault {
    /// Creates a vault from `config`. A config without a key is rejected.
    pub fn new(config: VaultConfig) -> Result<Self> {
        let activator = config.activator();
        Self::with_activator(config, activator)
    }

    /// Creates a vault that activates through a caller-supplied activator.
    pub fn with_activator(config: VaultConfig, activator: Arc<dyn Activator>) -> Result<Self> {
        let key = config.key.ok_or_else(|| {
            Error::Config("decryption key is required (set PROMPTVAULT_KEY)".into())
        })?;
        debug!(
            "vault configured for {} via {} activation ({:?} failures)",
            config.artifact_path.display(),
            activator.name(),
            config.failure_policy
        );
        Ok(Self {
            loader: Loader::new(config.artifact_path, key, activator),
            guard: InitGuard::new(config.failure_policy),
            purged: AtomicBool::new(false),
        })
    }

    pub fn builder() -> VaultBuilder {
        VaultBuilder::new()
    }

    /// Returns the secret, loading it on first use.
    pub fn load_secret(&self) -> Result<ProtectedBuffer> {
        Ok(self.loaded()?.buffer.clone())
    }

    /// The handle of the activated provider unit, loading on first use.
    pub fn provider_handle(&self) -> Result<ProviderHandle> {
        Ok(self.loaded()?.handle.clone())
    }

    /// Loads eagerly, e.g. at startup, so the first request does not pay for it.
    pub fn preload(&self) -> Result<()> {
        self.loaded().map(|_| ())
    }

    pub fn state(&self) -> LoadState {
        self.guard.state()
    }

    /// Number of load attempts started so far.
    pub fn attempts(&self) -> usize {
        self.guard.attempts()
    }

    pub fn artifact_path(&self) -> &Path {
        self.loader.artifact()
    }

    /// Whether the sealed artifact exists. Does not decrypt anything.
    pub fn artifact_present(&self) -> bool {
        self.loader.artifact().is_file()
    }

    /// Destroys the cached secret. Later loads return [`Error::Purged`].
    pub fn purge(&self) -> Result<()> {
        self.purged.store(true, Ordering::SeqCst);
        if let Some(loaded) = self.guard.get() {
            loaded.buffer.destroy()?;
            info!("purged secret loaded from {}", self.artifact_path().display());
        }
        Ok(())
    }

    pub fn is_purged(&self) -> bool {
        self.purged.load(Ordering::SeqCst)
    }

    fn loaded(&self) -> Result<&LoadedSecret> {
        if self.is_purged() {
            return Err(Error::Purged);
        }

        let loaded = self.guard.get_or_init(|| {
            if self.is_purged() {
                return Err(Error::Purged);
            }
            self.loader.load()
        })?;

        // purge() may have run while this load was in flight
        if self.is_purged() {
            loaded.buffer.destroy()?;
            return Err(Error::Purged);
        }
        // a process-wide purge (signal) destroys buffers behind our back
        if loaded.buffer.is_destroyed() {
            warn!("cached secret was destroyed by a process-wide purge");
            self.purged.store(true, Ordering::SeqCst);
            return Err(Error::Purged);
        }
        Ok(loaded)
    }
}

/// Builder for [`Vault`].
#[derive(Default)]
pub struct VaultBuilder {
    config: VaultConfig,
    activator: Option<Arc<dyn Activator>>,
}

impl VaultBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing config, e.g. [`VaultConfig::from_env`].
    pub fn with_config(mut self, config: VaultConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.artifact_path = path.into();
        self
    }

    pub fn with_key(mut self, key: EncryptionKey) -> Self {
        self.config.key = Some(key);
        self
    }

    pub fn with_format(mut self, format: ArtifactFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn with_transient_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.transient_dir = Some(dir.into());
        self
    }

    /// Overrides the activator implied by the format.
    pub fn with_activator(mut self, activator: Arc<dyn Activator>) -> Self {
        self.activator = Some(activator);
        self
    }

    pub fn build(self) -> Result<Vault> {
        match self.activator {
            Some(activator) => Vault::with_activator(self.config, activator),
            None => Vault::new(self.config),
        }
    }
}
