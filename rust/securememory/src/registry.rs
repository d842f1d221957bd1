//! Process-wide index of live buffers, so a signal handler can reach them.

use crate::buffer::BufferInner;
use log::{debug, error, info};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

static LIVE_BUFFERS: Lazy<Mutex<Vec<Weak<BufferInner>>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub(crate) fn register(inner: &Arc<BufferInner>) {
    let mut live = LIVE_BUFFERS.lock();
    live.retain(|weak| weak.strong_count() > 0);
    live.push(Arc::downgrade(inner));
}

/// Number of buffers that are still alive (destroyed or not).
pub fn live_count() -> usize {
    LIVE_BUFFERS
        .lock()
        .iter()
        .filter(|weak| weak.strong_count() > 0)
        .count()
}

/// Destroys every live protected buffer in the process.
///
/// Used on interrupt/termination; safe to call at any time. Buffers that
/// are already destroyed are skipped.
pub fn purge() {
    let live: Vec<Arc<BufferInner>> = {
        let mut guard = LIVE_BUFFERS.lock();
        let upgraded = guard.iter().filter_map(Weak::upgrade).collect();
        guard.clear();
        upgraded
    };

    info!("purging {} protected buffer(s)", live.len());
    for inner in live {
        if let Err(e) = inner.destroy(None) {
            error!("failed to destroy protected buffer during purge: {e}");
        }
    }
    debug!("purge complete");
}
