//! # Secure Memory
//!
//! Custody of a decrypted secret in memory the process treats specially:
//!
//! - pages come from a private anonymous mapping, pinned with `mlock` and
//!   excluded from core dumps where the platform allows it;
//! - the pages are `PROT_NONE` except while a reader is inside
//!   [`ProtectedBuffer::with_bytes`];
//! - [`ProtectedBuffer::destroy`] waits for readers, zeroes the region and
//!   unmaps it, and is idempotent;
//! - [`purge`] destroys every live buffer, and [`signal::catch_interrupt`]
//!   wires that to SIGINT/SIGTERM.
//!
//! ```rust,no_run
//! use securememory::ProtectedBuffer;
//!
//! let mut plaintext = b"hello secret".to_vec();
//! let buffer = ProtectedBuffer::new(&mut plaintext).unwrap();
//! // plaintext has been wiped
//!
//! let len = buffer.with_bytes(|bytes| bytes.len()).unwrap();
//! assert_eq!(len, 12);
//!
//! buffer.destroy().unwrap();
//! ```

pub mod buffer;
pub mod error;
mod registry;
pub mod signal;

pub use crate::buffer::{BufferReader, ProtectedBuffer};
pub use crate::error::{Result, SecureMemoryError};
pub use crate::registry::{live_count, purge};

/// Sets `RLIMIT_CORE` to zero for the current process.
pub fn disable_core_dumps() -> Result<()> {
    memcall::disable_core_dumps().map_err(SecureMemoryError::from)
}
