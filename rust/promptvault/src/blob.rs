//! The persisted artifact: `nonce (12) || ciphertext || tag (16)`, no header.

use crate::crypto::{GCM_NONCE_SIZE, GCM_TAG_SIZE};
use crate::error::{Error, Result};
use log::debug;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// An authenticated ciphertext as stored on disk.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherBlob {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for CipherBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherBlob")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl CipherBlob {
    /// Wraps raw artifact bytes, rejecting anything too short to hold a
    /// nonce and a tag.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < GCM_NONCE_SIZE {
            return Err(Error::CorruptData(format!(
                "artifact is {} bytes, shorter than the {GCM_NONCE_SIZE}-byte nonce",
                bytes.len()
            )));
        }
        if bytes.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
            return Err(Error::CorruptData(format!(
                "artifact is {} bytes, too short to carry an authentication tag",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// Reads an artifact. A missing file is `NotFound`.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound {
                path: path.to_path_buf(),
            },
            _ => Error::io(format!("reading {}", path.display()), &e),
        })?;
        Self::from_bytes(bytes)
    }

    /// Atomically replaces `path` with this blob.
    ///
    /// The bytes go to a temporary file in the same directory, are synced,
    /// then renamed over the target, so readers never see a partial artifact.
    pub fn write(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let context = || format!("writing {}", path.display());

        let mut staged = tempfile::Builder::new()
            .prefix(".promptvault-")
            .tempfile_in(dir)
            .map_err(|e| Error::io(context(), &e))?;
        staged
            .write_all(&self.bytes)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| Error::io(context(), &e))?;
        staged
            .persist(path)
            .map_err(|e| Error::io(context(), &e.error))?;

        debug!("wrote {} byte artifact to {}", self.bytes.len(), path.display());
        Ok(())
    }

    pub fn nonce(&self) -> &[u8] {
        &self.bytes[..GCM_NONCE_SIZE]
    }

    /// Ciphertext followed by the tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.bytes[GCM_NONCE_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
