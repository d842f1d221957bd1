// Shared fixtures for the vault integration tests

use promptvault::{
    Activated, Activator, EncryptionKey, Encryptor, InProcessActivator, Result, Vault,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";
pub const OTHER_KEY: &[u8; 32] = b"fedcba9876543210fedcba9876543210";
pub const PLAINTEXT: &[u8] = b"hello secret";
pub const ARTIFACT_NAME: &str = "prompt.bin.enc";

pub fn key() -> EncryptionKey {
    EncryptionKey::from_slice(KEY).unwrap()
}

// Seal `payload` into `dir` and return the artifact path
pub fn seal(dir: &Path, payload: &[u8]) -> PathBuf {
    let path = dir.join(ARTIFACT_NAME);
    Encryptor::new(key()).seal_to_file(payload, &path).unwrap();
    path
}

pub fn vault_for(path: &Path) -> Vault {
    Vault::builder()
        .with_artifact_path(path)
        .with_key(key())
        .build()
        .unwrap()
}

// An activator wrapper that counts activations and can stall them
pub struct CountingActivator {
    inner: InProcessActivator,
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingActivator {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            inner: InProcessActivator,
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Activator for CountingActivator {
    fn activate(&self, decrypted: zeroize::Zeroizing<Vec<u8>>) -> Result<Activated> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.activate(decrypted)
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

pub fn counting_vault(path: &Path, activator: &Arc<CountingActivator>) -> Vault {
    let activator: Arc<dyn Activator> = activator.clone();
    Vault::builder()
        .with_artifact_path(path)
        .with_key(key())
        .with_activator(activator)
        .build()
        .unwrap()
}
