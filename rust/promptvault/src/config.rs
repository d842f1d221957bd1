use crate::error::{Error, Result};
use crate::guard::FailurePolicy;
use crate::key::EncryptionKey;
use crate::provider::{Activator, InProcessActivator, UnitActivator};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default artifact location, relative to the working directory
pub const DEFAULT_ARTIFACT_PATH: &str = "prompt.bin.enc";

pub const ENV_ARTIFACT: &str = "PROMPTVAULT_ARTIFACT";
pub const ENV_KEY: &str = "PROMPTVAULT_KEY";
pub const ENV_FORMAT: &str = "PROMPTVAULT_FORMAT";
pub const ENV_RETRY: &str = "PROMPTVAULT_RETRY";

/// What the sealed artifact decrypts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArtifactFormat {
    /// The decrypted bytes are the secret.
    #[default]
    Raw,
    /// The decrypted bytes are a provider unit image exporting `get_data`.
    Unit,
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactFormat::Raw => f.write_str("raw"),
            ArtifactFormat::Unit => f.write_str("unit"),
        }
    }
}

impl FromStr for ArtifactFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(ArtifactFormat::Raw),
            "unit" => Ok(ArtifactFormat::Unit),
            other => Err(Error::Config(format!(
                "unknown artifact format `{other}` (expected `raw` or `unit`)"
            ))),
        }
    }
}

/// Configuration for a [`crate::Vault`]
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Where the sealed artifact lives
    pub artifact_path: PathBuf,

    /// 32-byte decryption key. Required.
    pub key: Option<EncryptionKey>,

    /// What the artifact decrypts to
    pub format: ArtifactFormat,

    /// Whether a failed load may be retried
    pub failure_policy: FailurePolicy,

    /// Where unit-format artifacts are staged; the OS temp dir when unset
    pub transient_dir: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            key: None,
            format: ArtifactFormat::Raw,
            failure_policy: FailurePolicy::Permanent,
            transient_dir: None,
        }
    }
}

impl VaultConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a config from `PROMPTVAULT_*` variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_key_var(ENV_KEY)
    }

    /// Like [`VaultConfig::from_env`], but reads the key from `key_var`.
    /// `PROMPTVAULT_KEY` is not consulted unless `key_var` names it.
    pub fn from_env_with_key_var(key_var: &str) -> Result<Self> {
        Self::from_lookup(key_var, |name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(key_var: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_ARTIFACT).filter(|p| !p.is_empty()) {
            config.artifact_path = PathBuf::from(path);
        }
        if let Some(encoded) = lookup(key_var) {
            let encoded = zeroize::Zeroizing::new(encoded);
            config.key = Some(EncryptionKey::from_hex(&encoded)?);
        }
        if let Some(format) = lookup(ENV_FORMAT) {
            config.format = format.parse()?;
        }
        if let Some(retry) = lookup(ENV_RETRY) {
            config.failure_policy = match retry.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => FailurePolicy::Retry,
                "" | "0" | "false" | "no" | "off" => FailurePolicy::Permanent,
                other => {
                    return Err(Error::Config(format!(
                        "{ENV_RETRY} must be a boolean, got `{other}`"
                    )))
                }
            };
        }
        Ok(config)
    }

    /// Set the artifact path
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    /// Set the decryption key
    pub fn with_key(mut self, key: EncryptionKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Set the artifact format
    pub fn with_format(mut self, format: ArtifactFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the staging directory for unit-format artifacts
    pub fn with_transient_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transient_dir = Some(dir.into());
        self
    }

    /// The activator matching [`Self::format`].
    pub fn activator(&self) -> Arc<dyn Activator> {
        match self.format {
            ArtifactFormat::Raw => Arc::new(InProcessActivator),
            ArtifactFormat::Unit => {
                let activator = match &self.transient_dir {
                    Some(dir) => UnitActivator::new().with_transient_root(dir),
                    None => UnitActivator::new(),
                };
                Arc::new(activator)
            }
        }
    }
}
