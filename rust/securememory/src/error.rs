use thiserror::Error;

/// Errors raised by the protected memory store.
///
/// Messages describe which step failed; they never carry buffer contents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecureMemoryError {
    /// The backing pages could not be mapped.
    #[error("Failed to allocate secure memory: {0}")]
    AllocationFailed(String),

    /// The pages could not be pinned in RAM.
    #[error("Failed to lock memory: {0}")]
    MemoryLockFailed(String),

    /// `mprotect` refused a transition.
    #[error("Failed to set memory protection: {0}")]
    ProtectionFailed(String),

    /// The pages could not be unmapped.
    #[error("Failed to free memory: {0}")]
    DeallocationFailed(String),

    /// The buffer has been destroyed; its contents are gone.
    #[error("Secret is already closed")]
    SecretClosed,

    /// Anything else, including signal handler installation.
    #[error("Secret operation failed: {0}")]
    OperationFailed(String),
}

impl From<memcall::MemcallError> for SecureMemoryError {
    fn from(err: memcall::MemcallError) -> Self {
        use memcall::MemcallError;
        match err {
            MemcallError::ResourceLimit(msg) => SecureMemoryError::MemoryLockFailed(msg),
            MemcallError::SystemError(msg) | MemcallError::InvalidArgument(msg) => {
                SecureMemoryError::OperationFailed(msg)
            }
        }
    }
}

/// Result type for securememory operations.
pub type Result<T> = std::result::Result<T, SecureMemoryError>;
