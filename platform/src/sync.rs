//! Shared-data locking
//!
//! `SharedLock` wraps a spin mutex with the system's best-effort posture:
//! contention beyond a bounded spin is reported through the diagnostic
//! channel, then the acquire proceeds. The caller's critical section is
//! never aborted by the lock layer; blocking a flight task forever on a
//! diagnostic condition is worse than the report.

use spin::Mutex;

/// Spin attempts before a contention diagnostic is logged.
const CONTENTION_SPINS: u32 = 10_000;

/// A mutex whose acquisition failures are diagnostics, not caller errors.
pub struct SharedLock<T> {
    name: &'static str,
    inner: Mutex<T>,
    contention_count: core::sync::atomic::AtomicU32,
}

impl<T> SharedLock<T> {
    /// Create a named lock. The name appears in contention diagnostics.
    pub const fn new(name: &'static str, value: T) -> Self {
        SharedLock {
            name,
            inner: Mutex::new(value),
            contention_count: core::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Run `f` with the lock held.
    ///
    /// Bounded try-lock spin first; on exhaustion the contention is
    /// logged and counted, then the acquire blocks. The operation always
    /// runs.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        for _ in 0..CONTENTION_SPINS {
            if let Some(mut guard) = self.inner.try_lock() {
                return f(&mut guard);
            }
            core::hint::spin_loop();
        }
        self.contention_count
            .fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        log::warn!("[sync] contention on shared lock '{}'", self.name);
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Number of contention diagnostics recorded.
    pub fn contention_count(&self) -> u32 {
        self.contention_count
            .load(core::sync::atomic::Ordering::Relaxed)
    }
}
