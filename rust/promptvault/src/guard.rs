//! Exactly-once initialization with an explicit load state machine.
//!
//! ```text
//! Unloaded ──> Loading ──> Loaded            (terminal)
//!                 │
//!                 └──────> Failed ──> Loading (only with FailurePolicy::Retry)
//! ```
//!
//! The first caller to find the guard `Unloaded` runs the initializer;
//! everyone arriving while it is `Loading` waits on a condition variable
//! and then observes the same outcome. Once `Loaded`, callers read the
//! cached value through one atomic load and never touch the mutex.

use crate::error::{Error, Result};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::OnceLock;

const UNLOADED: u8 = 0;
const LOADING: u8 = 1;
const LOADED: u8 = 2;
const FAILED: u8 = 3;

/// Observable state of an [`InitGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

/// What happens to calls made after a failed load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The first failure is returned forever.
    #[default]
    Permanent,
    /// A later call starts a fresh attempt.
    Retry,
}

struct Slot {
    failure: Option<Error>,
    // bumped at the start of every attempt
    generation: u64,
}

pub struct InitGuard<T> {
    state: AtomicU8,
    value: OnceLock<T>,
    slot: Mutex<Slot>,
    settled: Condvar,
    policy: FailurePolicy,
    attempts: AtomicUsize,
}

impl<T> std::fmt::Debug for InitGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitGuard")
            .field("state", &self.state())
            .field("policy", &self.policy)
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

impl<T> InitGuard<T> {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            state: AtomicU8::new(UNLOADED),
            value: OnceLock::new(),
            slot: Mutex::new(Slot {
                failure: None,
                generation: 0,
            }),
            settled: Condvar::new(),
            policy,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> LoadState {
        match self.state.load(Ordering::Acquire) {
            UNLOADED => LoadState::Unloaded,
            LOADING => LoadState::Loading,
            LOADED => LoadState::Loaded,
            _ => LoadState::Failed,
        }
    }

    /// How many times the initializer has been started.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }

    /// The cached value, if loaded. Lock-free.
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == LOADED {
            self.value.get()
        } else {
            None
        }
    }

    /// Returns the cached value, running `init` if nobody has succeeded yet.
    pub fn get_or_init<F>(&self, init: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }

        let mut slot = self.slot.lock();
        // the attempt this caller waited on, if any
        let mut waited_on: Option<u64> = None;
        loop {
            match self.state.load(Ordering::Acquire) {
                LOADED => {
                    if let Some(value) = self.value.get() {
                        return Ok(value);
                    }
                }
                LOADING => {
                    waited_on = Some(slot.generation);
                    self.settled.wait(&mut slot);
                    continue;
                }
                FAILED => {
                    let observed_this_attempt = waited_on == Some(slot.generation);
                    if self.policy == FailurePolicy::Permanent || observed_this_attempt {
                        if let Some(err) = slot.failure.clone() {
                            return Err(err);
                        }
                    }
                }
                _ => {}
            }
            break;
        }

        // This caller runs the attempt.
        slot.generation += 1;
        slot.failure = None;
        self.attempts.fetch_add(1, Ordering::AcqRel);
        self.state.store(LOADING, Ordering::Release);
        debug!("initialization attempt {} started", slot.generation);
        drop(slot);

        let mut attempt = Attempt {
            guard: self,
            finished: false,
        };
        let outcome = init();
        attempt.finished = true;

        let mut slot = self.slot.lock();
        let result = match outcome {
            Ok(value) => {
                let value = self.value.get_or_init(|| value);
                self.state.store(LOADED, Ordering::Release);
                Ok(value)
            }
            Err(err) => {
                slot.failure = Some(err.clone());
                self.state.store(FAILED, Ordering::Release);
                Err(err)
            }
        };
        self.settled.notify_all();
        drop(slot);
        result
    }
}

/// Marks the guard failed if the initializer unwinds, so waiters wake up.
struct Attempt<'a, T> {
    guard: &'a InitGuard<T>,
    finished: bool,
}

impl<T> Drop for Attempt<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("initializer panicked; marking load as failed");
        let mut slot = self.guard.slot.lock();
        slot.failure = Some(Error::Activation("initializer panicked".into()));
        self.guard.state.store(FAILED, Ordering::Release);
        self.guard.settled.notify_all();
    }
}
