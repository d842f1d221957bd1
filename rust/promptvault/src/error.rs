use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for promptvault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while sealing or loading the secret.
///
/// Messages say which stage failed and what to do about it. None of them
/// carries key material, plaintext, or cipher internals, so they are safe
/// to log. They are still not meant for untrusted clients: an exposure
/// layer should answer with a generic server error.
///
/// `Clone` so a failed first load can be handed to every waiting caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Reading or writing an artifact or transient file failed
    #[error("I/O error while {context}: {kind}")]
    Io {
        context: String,
        kind: io::ErrorKind,
    },

    /// The key is not exactly 32 bytes (or not valid hex)
    #[error("Invalid key: expected {expected} bytes, got {actual}")]
    InvalidKey { expected: usize, actual: usize },

    /// The cipher could not be set up or refused to seal
    #[error("Cipher initialization failed: {0}")]
    CryptoInit(String),

    /// The sealed artifact does not exist
    #[error("Sealed artifact not found: {}. Produce it first with `promptvault seal`", path.display())]
    NotFound { path: PathBuf },

    /// The artifact is too short or otherwise malformed
    #[error("Corrupt artifact: {0}")]
    CorruptData(String),

    /// AEAD open failed: wrong key, tampering, or truncation
    #[error("Artifact failed authentication (wrong key or tampered data)")]
    AuthenticationFailure,

    /// The provider unit has an incompatible format or could not be staged
    #[error("Provider unit activation failed: {0}")]
    Activation(String),

    /// The provider unit does not export the accessor
    #[error("Provider unit does not export `{0}`")]
    SymbolMissing(String),

    /// The accessor exists but is not a zero-argument byte accessor
    #[error("Provider unit symbol `{symbol}` has the wrong shape: expected {expected}, found {found}")]
    SymbolTypeMismatch {
        symbol: String,
        expected: String,
        found: String,
    },

    /// The protected memory store failed
    #[error("Secure memory error: {0}")]
    SecureMemory(#[from] securememory::SecureMemoryError),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The secret was purged and will not be reloaded
    #[error("Secret has been purged")]
    Purged,
}

impl Error {
    /// Wraps an I/O error with the stage that produced it.
    pub fn io(context: impl Into<String>, err: &io::Error) -> Self {
        Error::Io {
            context: context.into(),
            kind: err.kind(),
        }
    }

    /// Whether the same call may succeed later without a code or key change,
    /// e.g. once the artifact has been produced or a disk recovers.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Io { .. } | Error::NotFound { .. })
    }
}
