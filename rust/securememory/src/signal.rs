//! Wipe protected memory when the process is interrupted or terminated.
//!
//! SIGINT is caught through `ctrlc`, SIGTERM through a `signal-hook`
//! iterator thread. Both run the optional user callback, call
//! [`crate::purge`], and exit with status 1. SIGKILL cannot be caught; a
//! hard kill leaves locked pages to the kernel, which does not swap them
//! but does not zero them either.

use crate::error::{Result, SecureMemoryError};
use crate::registry::purge;
use log::info;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use signal_hook::consts::signal::SIGTERM;
use signal_hook::iterator::Signals;
use std::fmt;
use std::process;
use std::sync::Arc;
use std::thread;

/// A termination signal the store reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGINT, usually Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => write!(f, "SIGINT"),
            Signal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

type Handler = Box<dyn Fn(Signal) + Send + Sync + 'static>;

static HANDLER: OnceCell<Arc<RwLock<Option<Handler>>>> = OnceCell::new();

fn on_signal(slot: &RwLock<Option<Handler>>, signal: Signal) -> ! {
    if let Some(handler) = slot.read().as_ref() {
        handler(signal);
    }
    info!("received {signal}, wiping protected memory");
    purge();
    #[allow(clippy::exit)]
    process::exit(1)
}

fn install() -> Result<&'static Arc<RwLock<Option<Handler>>>> {
    HANDLER.get_or_try_init(|| {
        let slot: Arc<RwLock<Option<Handler>>> = Arc::new(RwLock::new(None));

        let interrupt_slot = Arc::clone(&slot);
        ctrlc::set_handler(move || {
            on_signal(&interrupt_slot, Signal::Interrupt);
        })
        .map_err(|e| {
            SecureMemoryError::OperationFailed(format!("failed to set SIGINT handler: {e}"))
        })?;

        let mut signals = Signals::new([SIGTERM]).map_err(|e| {
            SecureMemoryError::OperationFailed(format!("failed to set SIGTERM handler: {e}"))
        })?;
        let terminate_slot = Arc::clone(&slot);
        thread::Builder::new()
            .name("securememory-sigterm".to_string())
            .spawn(move || {
                if signals.forever().next().is_some() {
                    on_signal(&terminate_slot, Signal::Terminate);
                }
            })
            .map_err(|e| {
                SecureMemoryError::OperationFailed(format!("failed to spawn signal thread: {e}"))
            })?;

        Ok(slot)
    })
}

/// Purges protected memory and exits when SIGINT or SIGTERM arrives.
///
/// Idempotent; the first call installs the handlers.
pub fn catch_interrupt() -> Result<()> {
    install().map(|_| ())
}

/// Like [`catch_interrupt`], additionally running `handler` before the purge.
///
/// A later call replaces the previous handler.
pub fn catch_signal<F>(handler: F) -> Result<()>
where
    F: Fn(Signal) + Send + Sync + 'static,
{
    let slot = install()?;
    *slot.write() = Some(Box::new(handler));
    Ok(())
}

/// Purges protected memory, then exits with `code`.
pub fn exit(code: i32) -> ! {
    purge();
    #[allow(clippy::exit)]
    process::exit(code)
}
