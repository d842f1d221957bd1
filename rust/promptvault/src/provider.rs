//! Secret providers and the activators that produce them.
//!
//! Activation turns freshly decrypted bytes into a [`SecretProvider`], a unit
//! with a single capability: hand over the secret. Two activators exist:
//!
//! - [`InProcessActivator`]: the decrypted bytes *are* the secret. Nothing
//!   touches the filesystem. This is the default.
//! - [`UnitActivator`]: the decrypted bytes are a versioned [`UnitImage`].
//!   It is staged in a private transient file, read back as a self-contained
//!   unit, scrubbed and deleted, and its accessor is resolved.

use crate::error::{Error, Result};
use crate::unit::{UnitImage, ACCESSOR_SYMBOL};
use log::{debug, warn};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// The single accessor contract of an activated provider unit.
pub trait SecretProvider: Send + Sync {
    /// Returns the secret bytes. Providers release their copy when it is
    /// handed over, so a second call fails.
    fn secret(&self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Makes decrypted bytes callable as a [`SecretProvider`].
pub trait Activator: Send + Sync {
    fn activate(&self, decrypted: Zeroizing<Vec<u8>>) -> Result<Activated>;

    /// Short name used in logs and the provider handle.
    fn name(&self) -> &'static str;
}

/// What an activator produced: the provider and the symbol it resolved.
pub struct Activated {
    pub provider: Box<dyn SecretProvider>,
    pub symbol: Option<String>,
}

/// Opaque description of the activated unit, cached once per vault.
///
/// Holds no secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderHandle {
    activator: &'static str,
    symbol: Option<String>,
    secret_len: usize,
}

impl ProviderHandle {
    pub(crate) fn new(activator: &'static str, symbol: Option<String>, secret_len: usize) -> Self {
        Self {
            activator,
            symbol,
            secret_len,
        }
    }

    pub fn activator(&self) -> &'static str {
        self.activator
    }

    /// The resolved accessor symbol, if the unit exported one.
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn secret_len(&self) -> usize {
        self.secret_len
    }
}

/// A provider holding the secret directly in process memory until it is
/// taken.
pub struct InProcessProvider {
    secret: Mutex<Option<Zeroizing<Vec<u8>>>>,
}

impl InProcessProvider {
    pub fn new(secret: Zeroizing<Vec<u8>>) -> Self {
        Self {
            secret: Mutex::new(Some(secret)),
        }
    }
}

impl SecretProvider for InProcessProvider {
    fn secret(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.secret
            .lock()
            .take()
            .ok_or_else(|| Error::Activation("provider accessor already drained".into()))
    }
}

/// Treats the decrypted artifact as the secret itself.
#[derive(Debug, Default, Clone)]
pub struct InProcessActivator;

impl Activator for InProcessActivator {
    fn activate(&self, decrypted: Zeroizing<Vec<u8>>) -> Result<Activated> {
        Ok(Activated {
            provider: Box::new(InProcessProvider::new(decrypted)),
            symbol: None,
        })
    }

    fn name(&self) -> &'static str {
        "in-process"
    }
}

/// Activates a [`UnitImage`] staged through a private transient file.
#[derive(Debug, Default, Clone)]
pub struct UnitActivator {
    transient_root: Option<PathBuf>,
}

impl UnitActivator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage transient units under `root` instead of the OS temp directory.
    pub fn with_transient_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.transient_root = Some(root.into());
        self
    }

    fn stage(&self, decrypted: &[u8]) -> Result<TransientUnit> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("promptvault-unit-");
        // tempfile creates the directory with mode 0700 on unix
        let dir = match &self.transient_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| Error::io("creating transient unit directory", &e))?;

        let path = dir.path().join("provider.unit");
        let mut options = OpenOptions::new();
        options.read(true).write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&path)
            .map_err(|e| Error::io("creating transient unit file", &e))?;

        let unit = TransientUnit {
            _dir: dir,
            path,
            len: decrypted.len(),
        };
        file.write_all(decrypted)
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::io("writing transient unit", &e))?;
        Ok(unit)
    }
}

impl Activator for UnitActivator {
    fn activate(&self, decrypted: Zeroizing<Vec<u8>>) -> Result<Activated> {
        let unit = self.stage(&decrypted)?;
        drop(decrypted);
        debug!("staged provider unit at {}", unit.path.display());

        let image_bytes = unit.consume()?;
        // scrubbed and deleted here, before the image is even parsed
        drop(unit);

        let image = UnitImage::decode(&image_bytes)?;
        let secret = image.resolve_accessor(ACCESSOR_SYMBOL)?;
        Ok(Activated {
            provider: Box::new(InProcessProvider::new(secret)),
            symbol: Some(ACCESSOR_SYMBOL.to_owned()),
        })
    }

    fn name(&self) -> &'static str {
        "unit"
    }
}

/// A staged unit file. Dropping it overwrites the file with zeros, removes
/// it, and removes its private directory.
struct TransientUnit {
    _dir: tempfile::TempDir,
    path: PathBuf,
    len: usize,
}

impl TransientUnit {
    fn consume(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut file =
            File::open(&self.path).map_err(|e| Error::io("opening transient unit", &e))?;
        let mut bytes = Zeroizing::new(Vec::with_capacity(self.len));
        file.read_to_end(&mut bytes)
            .map_err(|e| Error::io("reading transient unit", &e))?;
        Ok(bytes)
    }
}

fn scrub(path: &Path, len: usize) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(0))?;
    let zeros = [0_u8; 4096];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(zeros.len());
        file.write_all(&zeros[..n])?;
        remaining -= n;
    }
    file.sync_all()?;
    fs::remove_file(path)
}

impl Drop for TransientUnit {
    fn drop(&mut self) {
        if let Err(e) = scrub(&self.path, self.len) {
            warn!("failed to scrub transient unit {}: {e}", self.path.display());
            let _ = fs::remove_file(&self.path);
        }
    }
}
