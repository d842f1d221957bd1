//! The protected buffer itself.
//!
//! Protection state transitions:
//!
//! ```text
//! store ──> NoAccess ──(first reader enters)──> ReadOnly
//!              ^                                   │
//!              └────────(last reader leaves)───────┘
//!
//! destroy: wait for readers ──> ReadWrite ──> zero ──> munlock ──> munmap
//! ```

use crate::error::{Result, SecureMemoryError};
use crate::registry;
use log::{debug, trace, warn};
use memcall::{MappedRegion, MemoryProtection};
use parking_lot::{Condvar, Mutex};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use zeroize::{Zeroize, Zeroizing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProtectionState {
    NoAccess,
    ReadOnly,
}

struct RegionState {
    region: Option<MappedRegion>,
    protection: ProtectionState,
}

pub(crate) struct BufferInner {
    // Cached start of the mapping; null for an empty payload. Valid while
    // `closed` is false and the reader count is held.
    data: *const u8,
    len: usize,
    locked: bool,

    closed: AtomicBool,
    closing: AtomicBool,

    readers: AtomicUsize,
    readers_mutex: Mutex<()>,
    readers_cond: Condvar,

    state: Mutex<RegionState>,
}

// `data` points into a mapping owned by `state`; every access is gated by
// the reader count and the closed flags.
unsafe impl Send for BufferInner {}
unsafe impl Sync for BufferInner {}

/// A page-locked, normally inaccessible region holding one secret.
///
/// Clones share the same region. The region is zeroed and unmapped on
/// [`ProtectedBuffer::destroy`], on a process-wide [`crate::purge`], or when
/// the last clone is dropped.
#[derive(Clone)]
pub struct ProtectedBuffer {
    inner: Arc<BufferInner>,
}

impl std::fmt::Debug for ProtectedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectedBuffer")
            .field("len", &self.inner.len)
            .field("locked", &self.inner.locked)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl ProtectedBuffer {
    /// Copies `source` into locked memory and wipes `source`.
    ///
    /// Locking is best effort: when `mlock` is refused (typically
    /// `RLIMIT_MEMLOCK`), the buffer is still created and [`Self::is_locked`]
    /// reports false.
    pub fn new(source: &mut [u8]) -> Result<Self> {
        let result = Self::copy_in(source);
        source.zeroize();
        result
    }

    /// Takes ownership of a transient plaintext copy; it is wiped on return.
    pub fn from_zeroizing(mut source: Zeroizing<Vec<u8>>) -> Result<Self> {
        Self::new(source.as_mut_slice())
    }

    fn copy_in(source: &[u8]) -> Result<Self> {
        let len = source.len();
        trace!("storing {} bytes in protected memory", len);

        let (region, data, locked) = if len == 0 {
            (None, std::ptr::null(), false)
        } else {
            let mut region = MappedRegion::map(len)
                .map_err(|e| SecureMemoryError::AllocationFailed(e.to_string()))?;

            let locked = match region.lock() {
                Ok(()) => true,
                Err(e) => {
                    warn!("protected buffer left unlocked, pages may be swapped: {e}");
                    false
                }
            };

            // SAFETY: the mapping is at least `len` bytes and ReadWrite.
            unsafe {
                std::ptr::copy_nonoverlapping(source.as_ptr(), region.as_mut_ptr(), len);
            }

            region
                .protect(MemoryProtection::NoAccess)
                .map_err(|e| SecureMemoryError::ProtectionFailed(e.to_string()))?;

            let data = region.as_ptr();
            (Some(region), data, locked)
        };

        let inner = Arc::new(BufferInner {
            data,
            len,
            locked,
            closed: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            readers: AtomicUsize::new(0),
            readers_mutex: Mutex::new(()),
            readers_cond: Condvar::new(),
            state: Mutex::new(RegionState {
                region,
                protection: ProtectionState::NoAccess,
            }),
        });
        registry::register(&inner);
        metrics::increment_counter!("securememory.buffer.created");

        Ok(Self { inner })
    }

    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Whether the pages were successfully pinned with `mlock`.
    pub fn is_locked(&self) -> bool {
        self.inner.locked
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Runs `action` with a read-only view of the secret.
    ///
    /// The pages are readable only while at least one `with_bytes` call is
    /// in progress. Anything `action` copies out is no longer protected.
    pub fn with_bytes<F, R>(&self, action: F) -> Result<R>
    where
        F: FnOnce(&[u8]) -> R,
    {
        self.inner.with_bytes(action)
    }

    /// Streams the secret into `writer` straight from the protected view.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        self.with_bytes(|bytes| writer.write_all(bytes).map(|()| bytes.len()))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }

    /// A `Read` adapter over the secret.
    pub fn reader(&self) -> BufferReader<'_> {
        BufferReader {
            buffer: self,
            position: 0,
        }
    }

    /// Zeroes and releases the region.
    ///
    /// Blocks until in-flight readers leave. Calling it again is a no-op.
    pub fn destroy(&self) -> Result<()> {
        self.inner.destroy(None)
    }

    /// Like [`Self::destroy`] but hands the zeroed region to `observer`
    /// before it is unmapped.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn destroy_observed<F>(&self, mut observer: F) -> Result<()>
    where
        F: FnMut(&[u8]),
    {
        self.inner.destroy(Some(&mut observer))
    }
}

struct ReaderGuard<'a> {
    inner: &'a BufferInner,
}

impl Drop for ReaderGuard<'_> {
    fn drop(&mut self) {
        let previous = self.inner.readers.fetch_sub(1, Ordering::SeqCst);
        if previous != 1 {
            return;
        }

        {
            let _lock = self.inner.readers_mutex.lock();
            self.inner.readers_cond.notify_all();
        }

        if self.inner.closing.load(Ordering::SeqCst) {
            return;
        }

        let mut state = self.inner.state.lock();
        if self.inner.readers.load(Ordering::SeqCst) != 0
            || state.protection == ProtectionState::NoAccess
        {
            return;
        }
        if let Some(region) = state.region.as_ref() {
            match region.protect(MemoryProtection::NoAccess) {
                Ok(()) => state.protection = ProtectionState::NoAccess,
                Err(e) => warn!("could not revoke read access: {e}"),
            }
        }
    }
}

impl BufferInner {
    fn with_bytes<F, R>(&self, action: F) -> Result<R>
    where
        F: FnOnce(&[u8]) -> R,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SecureMemoryError::SecretClosed);
        }

        self.readers.fetch_add(1, Ordering::SeqCst);
        let _guard = ReaderGuard { inner: self };

        // destroy may have started between the first check and the increment
        if self.closed.load(Ordering::SeqCst) {
            return Err(SecureMemoryError::SecretClosed);
        }

        if self.len == 0 {
            return Ok(action(&[]));
        }

        {
            let mut state = self.state.lock();
            let region = state.region.as_ref().ok_or(SecureMemoryError::SecretClosed)?;
            if state.protection == ProtectionState::NoAccess {
                region
                    .protect(MemoryProtection::ReadOnly)
                    .map_err(|e| SecureMemoryError::ProtectionFailed(e.to_string()))?;
                state.protection = ProtectionState::ReadOnly;
            }
        }

        // SAFETY: readers > 0 keeps destroy waiting, so the mapping is live
        // and ReadOnly for the duration of `action`.
        let view = unsafe { std::slice::from_raw_parts(self.data, self.len) };
        Ok(action(view))
    }

    pub(crate) fn destroy(&self, observer: Option<&mut dyn FnMut(&[u8])>) -> Result<()> {
        if self
            .closing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("protected buffer already destroyed");
            return Ok(());
        }
        self.closed.store(true, Ordering::SeqCst);

        {
            let mut lock = self.readers_mutex.lock();
            while self.readers.load(Ordering::SeqCst) != 0 {
                self.readers_cond.wait(&mut lock);
            }
        }

        let region = self.state.lock().region.take();
        let released = match (region, observer) {
            (Some(region), Some(observer)) => region.release_observed(observer),
            (Some(region), None) => region.release(),
            (None, Some(observer)) => {
                observer(&[]);
                Ok(())
            }
            (None, None) => Ok(()),
        };
        released.map_err(|e| SecureMemoryError::DeallocationFailed(e.to_string()))?;

        metrics::increment_counter!("securememory.buffer.destroyed");
        debug!("protected buffer of {} bytes destroyed", self.len);
        Ok(())
    }
}

/// Sequential `Read` over a [`ProtectedBuffer`].
#[derive(Debug)]
pub struct BufferReader<'a> {
    buffer: &'a ProtectedBuffer,
    position: usize,
}

impl Read for BufferReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let position = self.position;
        let read = self
            .buffer
            .with_bytes(|bytes| {
                let remaining = bytes.len().saturating_sub(position);
                let n = remaining.min(buf.len());
                buf[..n].copy_from_slice(&bytes[position..position + n]);
                n
            })
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        self.position += read;
        Ok(read)
    }
}
