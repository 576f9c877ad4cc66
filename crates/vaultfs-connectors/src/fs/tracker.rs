//! Native handle tracker.
//!
//! [`HandleTracker`] keeps a strong reference to every published native
//! handle together with a weak reference to its owner. Owners deregister
//! (and close) their handle explicitly; [`HandleTracker::reclaim`] closes
//! handles whose owner disappeared without doing so. The sweep is a leak
//! guard only, never the primary release path.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::fs::NativeHandle;

static GLOBAL_TRACKER: OnceLock<Arc<HandleTracker>> = OnceLock::new();

struct TrackedHandle {
    owner: Weak<dyn Any + Send + Sync>,
    handle: NativeHandle,
}

/// Registry of live native handles keyed by owner id.
#[derive(Default)]
pub struct HandleTracker {
    entries: Mutex<HashMap<u64, TrackedHandle>>,
}

impl HandleTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide tracker.
    pub fn global() -> Arc<HandleTracker> {
        Arc::clone(GLOBAL_TRACKER.get_or_init(|| Arc::new(HandleTracker::new())))
    }

    /// Registers a handle owned by `owner`.
    pub fn register(&self, key: u64, owner: Weak<dyn Any + Send + Sync>, handle: NativeHandle) {
        self.entries
            .lock()
            .insert(key, TrackedHandle { owner, handle });
    }

    /// Removes a registration, returning the handle if it was tracked.
    pub fn deregister(&self, key: u64) -> Option<NativeHandle> {
        self.entries.lock().remove(&key).map(|t| t.handle)
    }

    /// Returns true if the key is registered.
    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.entries.lock().contains_key(&key)
    }

    /// Returns the number of tracked handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Closes every handle whose owner is gone. Returns how many were closed.
    pub fn reclaim(&self) -> usize {
        let orphaned: Vec<(u64, NativeHandle)> = {
            let mut entries = self.entries.lock();
            let dead: Vec<u64> = entries
                .iter()
                .filter(|(_, t)| t.owner.strong_count() == 0)
                .map(|(k, _)| *k)
                .collect();
            dead.into_iter()
                .filter_map(|k| entries.remove(&k).map(|t| (k, t.handle)))
                .collect()
        };

        for (key, handle) in &orphaned {
            warn!(key, "reclaiming native filesystem handle of a dropped connector");
            if let Err(e) = handle.close() {
                warn!(key, error = %e, "failed to close reclaimed handle");
            }
        }
        orphaned.len()
    }

    /// Starts a background thread that calls [`HandleTracker::reclaim`] every
    /// `interval`. The thread stops when the returned handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn start_reaper(self: &Arc<Self>, interval: Duration) -> std::io::Result<ReaperHandle> {
        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let stopped = Arc::new(AtomicBool::new(false));
        let tracker = Arc::downgrade(self);
        let thread_signal = Arc::clone(&signal);

        let thread = std::thread::Builder::new()
            .name("vaultfs-handle-reaper".into())
            .spawn(move || {
                let (lock, cvar) = &*thread_signal;
                loop {
                    let mut stop = lock.lock();
                    if !*stop {
                        cvar.wait_for(&mut stop, interval);
                    }
                    if *stop {
                        break;
                    }
                    drop(stop);
                    let Some(tracker) = tracker.upgrade() else {
                        break;
                    };
                    let closed = tracker.reclaim();
                    if closed > 0 {
                        debug!(closed, "handle reaper pass");
                    }
                }
            })?;

        Ok(ReaperHandle {
            signal,
            stopped,
            thread: Some(thread),
        })
    }
}

impl std::fmt::Debug for HandleTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleTracker")
            .field("tracked", &self.len())
            .finish()
    }
}

/// Stops the reaper thread when dropped.
pub struct ReaperHandle {
    signal: Arc<(Mutex<bool>, Condvar)>,
    stopped: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Stops the reaper and waits for the thread to exit.
    ///
    /// Returns false if the reaper thread panicked.
    pub fn stop(&mut self) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return true;
        }
        let (lock, cvar) = &*self.signal;
        *lock.lock() = true;
        cvar.notify_all();
        match self.thread.take().map(JoinHandle::join) {
            Some(Err(_)) => {
                warn!("handle reaper thread panicked");
                false
            }
            _ => true,
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
