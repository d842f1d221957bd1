use thiserror::Error;

/// Errors returned by the memory syscall wrappers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemcallError {
    /// The kernel refused the call; the message carries the OS error.
    #[error("system call failed: {0}")]
    SystemError(String),

    /// The caller passed a length or flag the wrapper cannot honour.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The region is locked beyond `RLIMIT_MEMLOCK`.
    #[error("resource limit reached: {0}")]
    ResourceLimit(String),
}
