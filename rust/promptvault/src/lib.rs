//! # Prompt Vault
//!
//! Seal a secret payload at build time, load it exactly once at runtime.
//!
//! The sealing side ([`Encryptor`]) encrypts the payload with AES-256-GCM into
//! a self-describing blob, `nonce (12) ‖ ciphertext ‖ tag (16)`, and writes
//! it atomically to disk. The runtime side ([`Vault`]) finds that artifact,
//! authenticates and decrypts it, activates the provider unit it contains,
//! and keeps the secret in a [`ProtectedBuffer`]: page-locked memory that is
//! inaccessible outside reads and zeroed when released.
//!
//! Loading happens once per vault no matter how many threads ask for the
//! secret at the same time; see [`guard`] for the state machine.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use promptvault::{EncryptionKey, Encryptor, Vault, VaultConfig};
//! use std::path::Path;
//!
//! # fn example() -> promptvault::Result<()> {
//! let key = EncryptionKey::from_slice(b"0123456789abcdef0123456789abcdef")?;
//!
//! // Build time
//! Encryptor::new(key.clone()).seal_to_file(b"hello secret", Path::new("prompt.bin.enc"))?;
//!
//! // Runtime
//! let vault = Vault::new(VaultConfig::new().with_key(key))?;
//! let secret = vault.load_secret()?;
//! let len = secret.with_bytes(|bytes| bytes.len())?;
//! assert_eq!(len, 12);
//!
//! // Shutdown
//! vault.purge()?;
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod config;
pub mod crypto;
pub mod encryptor;
pub mod error;
pub mod guard;
pub mod key;
pub mod loader;
pub mod provider;
pub mod unit;
pub mod vault;

pub use blob::CipherBlob;
pub use config::{ArtifactFormat, VaultConfig};
pub use encryptor::{decrypt, encrypt, Encryptor, SealReport};
pub use error::{Error, Result};
pub use guard::{FailurePolicy, InitGuard, LoadState};
pub use key::{EncryptionKey, KEY_SIZE};
pub use loader::{LoadedSecret, Loader};
pub use provider::{Activated, Activator, InProcessActivator, ProviderHandle, SecretProvider, UnitActivator};
pub use vault::{Vault, VaultBuilder};

pub use securememory::ProtectedBuffer;
