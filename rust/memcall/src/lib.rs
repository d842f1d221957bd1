//! # memcall
//!
//! Thin wrappers over the page-level memory syscalls the protected store
//! needs: anonymous private mappings, `mprotect`, `mlock` (with
//! `MADV_DONTDUMP` on Linux) and disabling core dumps.
//!
//! Only unix targets are supported.

mod error;
mod types;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as platform;

#[cfg(not(unix))]
compile_error!("memcall only supports unix targets");

pub use error::MemcallError;
pub use platform::MappedRegion;
pub use types::MemoryProtection;

/// Returns the system page size.
pub fn page_size() -> usize {
    platform::page_size()
}

/// Sets `RLIMIT_CORE` to zero so a crash cannot write secrets to a core file.
pub fn disable_core_dumps() -> Result<(), MemcallError> {
    platform::disable_core_dumps()
}
