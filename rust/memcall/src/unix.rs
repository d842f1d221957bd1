use crate::error::MemcallError;
use crate::types::MemoryProtection;
use log::warn;
use once_cell::sync::Lazy;
use std::io;
use std::ptr::{self, NonNull};

static PAGE_SIZE: Lazy<usize> = Lazy::new(|| {
    // sysconf cannot fail for _SC_PAGESIZE on any supported unix
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        4096
    } else {
        size as usize
    }
});

pub(crate) fn page_size() -> usize {
    *PAGE_SIZE
}

fn last_os_error() -> String {
    io::Error::last_os_error().to_string()
}

/// An anonymous, private, page-aligned mapping.
///
/// The mapping is zero-filled by the kernel. It is not locked until
/// [`MappedRegion::lock`] is called. Dropping an unreleased region wipes
/// and unmaps it.
#[derive(Debug)]
pub struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
    locked: bool,
    released: bool,
}

// The region is exclusively owned; synchronisation is the caller's job.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Maps `len` bytes rounded up to whole pages.
    pub fn map(len: usize) -> Result<Self, MemcallError> {
        if len == 0 {
            return Err(MemcallError::InvalidArgument(
                "cannot map a zero-length region".to_string(),
            ));
        }
        let page = page_size();
        let rounded = len
            .checked_add(page - 1)
            .map(|n| n / page * page)
            .ok_or_else(|| MemcallError::InvalidArgument(format!("length {len} overflows")))?;

        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                rounded,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(MemcallError::SystemError(format!(
                "mmap of {rounded} bytes: {}",
                last_os_error()
            )));
        }
        let ptr = NonNull::new(raw.cast::<u8>()).ok_or_else(|| {
            MemcallError::SystemError("mmap returned a null mapping".to_string())
        })?;

        Ok(Self {
            ptr,
            len: rounded,
            locked: false,
            released: false,
        })
    }

    /// Length of the mapping in bytes (a multiple of the page size).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; zero-length mappings are rejected by `map`.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Changes the access rights of the whole mapping.
    pub fn protect(&self, protection: MemoryProtection) -> Result<(), MemcallError> {
        let rc = unsafe {
            libc::mprotect(
                self.ptr.as_ptr().cast::<libc::c_void>(),
                self.len,
                protection.as_prot(),
            )
        };
        if rc != 0 {
            return Err(MemcallError::SystemError(format!(
                "mprotect({protection:?}) on {:p}: {}",
                self.ptr,
                last_os_error()
            )));
        }
        Ok(())
    }

    /// Pins the pages in RAM and, on Linux, excludes them from core dumps.
    pub fn lock(&mut self) -> Result<(), MemcallError> {
        #[cfg(target_os = "linux")]
        unsafe {
            libc::madvise(
                self.ptr.as_ptr().cast::<libc::c_void>(),
                self.len,
                libc::MADV_DONTDUMP,
            );
        }

        let rc = unsafe { libc::mlock(self.ptr.as_ptr().cast::<libc::c_void>(), self.len) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::ENOMEM) | Some(libc::EPERM) => MemcallError::ResourceLimit(format!(
                    "mlock of {} bytes, RLIMIT_MEMLOCK reached? ({err})",
                    self.len
                )),
                _ => MemcallError::SystemError(format!("mlock on {:p}: {err}", self.ptr)),
            });
        }
        self.locked = true;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Overwrites the mapping with zeros. The region must be writable.
    ///
    /// # Safety
    ///
    /// The caller guarantees the mapping is currently `ReadWrite` and that
    /// no other thread holds a view into it.
    pub unsafe fn wipe(&self) {
        for offset in 0..self.len {
            ptr::write_volatile(self.ptr.as_ptr().add(offset), 0);
        }
        std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);
    }

    /// Makes the region writable, zeroes it, unlocks and unmaps it.
    pub fn release(mut self) -> Result<(), MemcallError> {
        self.release_in_place(None)
    }

    /// Like [`Self::release`], handing the zeroed region to `observer`
    /// between the wipe and the unmap.
    pub fn release_observed<F>(mut self, mut observer: F) -> Result<(), MemcallError>
    where
        F: FnMut(&[u8]),
    {
        self.release_in_place(Some(&mut observer))
    }

    fn release_in_place(
        &mut self,
        observer: Option<&mut dyn FnMut(&[u8])>,
    ) -> Result<(), MemcallError> {
        if self.released {
            return Ok(());
        }

        // An mprotect failure must not keep the pages mapped.
        let writable = self.protect(MemoryProtection::ReadWrite);
        match &writable {
            Ok(()) => {
                // SAFETY: just made writable and we hold the only handle.
                unsafe { self.wipe() };
                if let Some(observer) = observer {
                    // SAFETY: the mapping is live and readable until munmap below.
                    let view = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) };
                    observer(view);
                }
            }
            Err(e) => warn!("region {:p} not wiped before unmap: {e}", self.ptr),
        }

        if self.locked {
            let rc = unsafe { libc::munlock(self.ptr.as_ptr().cast::<libc::c_void>(), self.len) };
            if rc != 0 {
                warn!("munlock on {:p} failed: {}", self.ptr, last_os_error());
            }
            self.locked = false;
        }

        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast::<libc::c_void>(), self.len) };
        if rc != 0 {
            return Err(MemcallError::SystemError(format!(
                "munmap of {:p}: {}",
                self.ptr,
                last_os_error()
            )));
        }
        self.released = true;
        writable
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if let Err(e) = self.release_in_place(None) {
            warn!("releasing mapped region on drop: {e}");
        }
    }
}

pub(crate) fn disable_core_dumps() -> Result<(), MemcallError> {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) };
    if rc != 0 {
        return Err(MemcallError::SystemError(format!(
            "setrlimit(RLIMIT_CORE, 0): {}",
            last_os_error()
        )));
    }
    Ok(())
}
